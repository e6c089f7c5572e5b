//! Scheduler subsystem
//!
//! Multi-level feedback scheduler with active/expired sets per level,
//! plus round-robin and FIFO table-scan modes selected at boot.

pub mod core;
pub mod process;
pub mod queue;

// Re-exports
pub use self::core::{
    Dispatch, SchedConfig, Scheduler, SchedulerError, SchedulerResult, SchedulingPolicy,
};
pub use process::{Pid, ProcHandle, ProcState, WaitChannel};
pub use queue::QueueSet;
