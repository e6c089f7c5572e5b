//! Process module
//!
//! Process records split along the two lock granularities: identity, state
//! and quantum live behind the per-process lock ([`ProcInner`]); queue links
//! and levels live in the queue store behind the global queue lock.

pub mod state;
pub mod table;

use alloc::string::String;
use core::fmt;

use crate::sync::IrqMutexGuard;

pub use state::{validate_transition, ProcState};
pub use table::{ProcTable, Process};

/// Process ID type
pub type Pid = u32;

/// Opaque identity a sleeping process waits on
pub type WaitChannel = usize;

/// Stable index of a process table slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcHandle(usize);

impl ProcHandle {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ProcHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Fields guarded by the per-process lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcInner {
    /// Lifecycle state
    pub state: ProcState,

    /// Process ID (0 while unused)
    pub pid: Pid,

    /// Debug name
    pub name: String,

    /// Remaining ticks of this dispatch
    pub quantum: i32,

    /// Wait channel, set only while sleeping
    pub chan: Option<WaitChannel>,

    /// Sticky cooperative kill flag
    pub killed: bool,

    /// Parent pid, owned by the wait subsystem
    pub parent: Option<Pid>,

    /// Exit status reported to the parent
    pub exit_status: i32,
}

impl ProcInner {
    /// Fields of a free slot
    pub const fn unused() -> Self {
        Self {
            state: ProcState::Unused,
            pid: 0,
            name: String::new(),
            quantum: 0,
            chan: None,
            killed: false,
            parent: None,
            exit_status: 0,
        }
    }

    /// Move to `to`; illegal transitions trip in debug builds
    pub fn set_state(&mut self, to: ProcState) {
        debug_assert!(
            validate_transition(self.state, to),
            "pid {}: illegal transition {} -> {}",
            self.pid,
            self.state,
            to
        );
        self.state = to;
    }

    /// Return the slot to its free state
    pub fn reset(&mut self) {
        *self = Self::unused();
    }
}

impl Default for ProcInner {
    fn default() -> Self {
        Self::unused()
    }
}

/// Held per-process lock
pub type ProcGuard<'a> = IrqMutexGuard<'a, ProcInner>;
