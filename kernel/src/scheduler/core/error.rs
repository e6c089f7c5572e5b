//! Scheduler Error Handling
//!
//! Recoverable failures reported to lifecycle callers. Contract violations
//! (bad level index, suspending with the wrong lock state, scheduling a
//! running process) are not errors: they abort through [`sched_assert!`].

use core::fmt;

use crate::scheduler::process::Pid;

/// Scheduler error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    // ═══════════════════════════════════════════════════════════════
    // Process Table Errors
    // ═══════════════════════════════════════════════════════════════

    /// Every slot of the process table is in use
    ProcessTableFull { max: usize },

    /// No live process carries this pid
    NoSuchProcess { pid: Pid },

    /// Slot cannot be reaped before it has exited
    NotZombie { pid: Pid },

    // ═══════════════════════════════════════════════════════════════
    // Priority Errors
    // ═══════════════════════════════════════════════════════════════

    /// Caller-supplied priority level outside `[0, levels)`
    InvalidPriority { value: usize, levels: usize },

    // ═══════════════════════════════════════════════════════════════
    // Configuration Errors
    // ═══════════════════════════════════════════════════════════════

    /// Boot configuration rejected
    InvalidConfig { reason: &'static str },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProcessTableFull { max } => {
                write!(f, "Process table full: {} slots in use", max)
            }
            Self::NoSuchProcess { pid } => write!(f, "Process {} not found", pid),
            Self::NotZombie { pid } => write!(f, "Process {} has not exited", pid),
            Self::InvalidPriority { value, levels } => {
                write!(f, "Invalid priority {}: must be below {}", value, levels)
            }
            Self::InvalidConfig { reason } => write!(f, "Invalid scheduler config: {}", reason),
        }
    }
}

impl SchedulerError {
    /// Get recovery hint for this error
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            Self::ProcessTableFull { .. } => "Wait for processes to exit and be reaped",
            Self::NoSuchProcess { .. } => "Process may have already been reaped",
            Self::NotZombie { .. } => "Wait for the process to exit first",
            Self::InvalidPriority { .. } => "Pick a level below the configured level count",
            Self::InvalidConfig { .. } => "Check the sched= boot arguments",
        }
    }

    /// Is this a recoverable error?
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidConfig { .. })
    }
}

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Macro for critical scheduler assertions
#[macro_export]
macro_rules! sched_assert {
    ($cond:expr, $reason:expr) => {
        if !$cond {
            panic!("[SCHED CRITICAL] Invariant violated: {}", $reason);
        }
    };
    ($cond:expr, $fmt:literal, $($arg:tt)+) => {
        if !$cond {
            panic!(concat!("[SCHED CRITICAL] Invariant violated: ", $fmt), $($arg)+);
        }
    };
}
