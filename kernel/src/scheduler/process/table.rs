//! Process table
//!
//! Fixed-size arena of process slots. Slots never move, so a [`ProcHandle`]
//! stays valid for the lifetime of the scheduler.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};

use super::{Pid, ProcGuard, ProcHandle, ProcInner, ProcState};
use crate::arch::InterruptControl;
use crate::sync::IrqMutex;

/// One process table slot
pub struct Process {
    handle: ProcHandle,
    inner: IrqMutex<ProcInner>,
}

impl Process {
    fn new(handle: ProcHandle) -> Self {
        Self {
            handle,
            inner: IrqMutex::new(ProcInner::unused()),
        }
    }

    pub fn handle(&self) -> ProcHandle {
        self.handle
    }

    /// Take the per-process lock
    pub fn lock<'a>(&'a self, irq: &'a dyn InterruptControl) -> ProcGuard<'a> {
        self.inner.lock(irq)
    }

    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    /// Release the lock a process carried across a context switch.
    ///
    /// # Safety
    /// Same contract as [`IrqMutex::force_unlock`]: the lock is held through
    /// a forgotten guard and nothing on this CPU still uses it.
    pub unsafe fn force_unlock(&self, irq: &dyn InterruptControl) {
        self.inner.force_unlock(irq);
    }
}

/// The process table
pub struct ProcTable {
    slots: Vec<Process>,
    next_pid: AtomicU32,
}

impl ProcTable {
    /// Create a table of `size` unused slots
    pub fn new(size: usize) -> Self {
        Self {
            slots: (0..size).map(|i| Process::new(ProcHandle::new(i))).collect(),
            next_pid: AtomicU32::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot behind `handle`; an out-of-range handle is a caller bug.
    pub fn get(&self, handle: ProcHandle) -> &Process {
        crate::sched_assert!(
            handle.index() < self.slots.len(),
            "process handle {} out of range",
            handle
        );
        &self.slots[handle.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Process> {
        self.slots.iter()
    }

    /// Claim the first unused slot, returning it locked in state `Used`
    /// with a fresh pid.
    pub fn alloc<'a>(&'a self, irq: &'a dyn InterruptControl) -> Option<(ProcHandle, ProcGuard<'a>)> {
        for slot in &self.slots {
            let mut guard = slot.lock(irq);
            if guard.state == ProcState::Unused {
                guard.reset();
                guard.pid = self.next_pid.fetch_add(1, Ordering::Relaxed);
                guard.set_state(ProcState::Used);
                return Some((slot.handle, guard));
            }
        }
        None
    }

    /// Find the live slot carrying `pid`
    pub fn find(&self, pid: Pid, irq: &dyn InterruptControl) -> Option<ProcHandle> {
        self.slots.iter().find_map(|slot| {
            let guard = slot.lock(irq);
            (guard.state.is_live() && guard.pid == pid).then_some(slot.handle)
        })
    }
}
