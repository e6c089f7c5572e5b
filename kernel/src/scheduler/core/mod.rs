//! Scheduler core module
//!
//! - `scheduler`: the [`Scheduler`] and its per-CPU dispatch loop
//! - `policy`: FIFO / RR / MQSS selection and the yield decision
//! - `lifecycle`: create, yield, sleep, wake, kill, exit hooks
//! - `dump`: queue dumps and schedlog

pub mod config;
pub mod dump;
pub mod error;
pub mod lifecycle;
pub mod policy;
pub mod scheduler;
pub mod statistics;

pub use config::{SchedConfig, SchedulingPolicy};
pub use error::{SchedulerError, SchedulerResult};
pub use policy::{decide_yield, YieldDecision};
pub use scheduler::{Dispatch, Scheduler};
pub use statistics::{SchedulerStats, StatsSnapshot};
