//! State - Process state machine
//!
//! Scheduler-observable lifecycle of a process table slot

use core::fmt;

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ProcState {
    /// Slot is free
    #[default]
    Unused = 0,

    /// Slot is allocated, process not yet runnable
    Used = 1,

    /// Process is sleeping on a wait channel
    Sleeping = 2,

    /// Process is ready to run
    Runnable = 3,

    /// Process is currently running on a CPU
    Running = 4,

    /// Process has exited, waiting to be reaped
    Zombie = 5,
}

impl ProcState {
    /// Convert from raw value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Unused),
            1 => Some(Self::Used),
            2 => Some(Self::Sleeping),
            3 => Some(Self::Runnable),
            4 => Some(Self::Running),
            5 => Some(Self::Zombie),
            _ => None,
        }
    }

    /// Check if state is schedulable
    pub fn is_schedulable(self) -> bool {
        matches!(self, Self::Runnable)
    }

    /// Does the slot hold a process at all?
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Unused)
    }
}

impl fmt::Display for ProcState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Unused => "unused",
            Self::Used => "used",
            Self::Sleeping => "sleep",
            Self::Runnable => "runble",
            Self::Running => "run",
            Self::Zombie => "zombie",
        };
        f.pad(name)
    }
}

/// Validate state transition
pub fn validate_transition(from: ProcState, to: ProcState) -> bool {
    use ProcState::*;

    match (from, to) {
        // Allocation
        (Unused, Used) => true,

        // First time runnable
        (Used, Runnable) => true,

        // Dispatch
        (Runnable, Running) => true,

        // Yield / preemption
        (Running, Runnable) => true,

        // Block
        (Running, Sleeping) => true,

        // Exit
        (Running, Zombie) => true,

        // Wakeup or kill
        (Sleeping, Runnable) => true,

        // Reaped, or creation rolled back
        (Zombie, Unused) | (Used, Unused) => true,

        _ => false,
    }
}
