//! Run queues
//!
//! Two doubly-linked FIFO queues per priority level (active and expired)
//! threaded through an arena of per-process links.

pub mod manager;
pub mod store;

pub use store::{Members, QueueLinks, QueueSet, QueueStore};
