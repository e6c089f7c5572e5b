//! Interrupt-safe spin locks
//!
//! Every lock the scheduler takes disables interrupts first, so a CPU that
//! holds a process lock can never be re-entered by its own timer interrupt
//! and a wakeup cannot slip in between "decide to sleep" and "switch away".

use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};

use spin::{Mutex, MutexGuard};

use crate::arch::InterruptControl;

/// Spin lock held with interrupts disabled
pub struct IrqMutex<T> {
    inner: Mutex<T>,
}

impl<T> IrqMutex<T> {
    /// Create a new lock
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Disable interrupts, then spin until the lock is ours
    pub fn lock<'a>(&'a self, irq: &'a dyn InterruptControl) -> IrqMutexGuard<'a, T> {
        irq.push_off();
        let guard = self.inner.lock();
        IrqMutexGuard {
            guard: ManuallyDrop::new(guard),
            irq,
        }
    }

    /// Is the lock currently held by anyone?
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    /// Release a lock whose guard was forgotten during a context switch,
    /// popping the interrupt nesting level that guard pushed.
    ///
    /// # Safety
    /// The lock must be held, its guard must have been `mem::forget`-ed,
    /// and no live guard may refer to it on this CPU.
    pub unsafe fn force_unlock(&self, irq: &dyn InterruptControl) {
        self.inner.force_unlock();
        irq.pop_off();
    }
}

/// Guard of an [`IrqMutex`]: releases the lock, then pops the interrupt
/// nesting level it pushed.
pub struct IrqMutexGuard<'a, T> {
    guard: ManuallyDrop<MutexGuard<'a, T>>,
    irq: &'a dyn InterruptControl,
}

impl<T> Deref for IrqMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for IrqMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for IrqMutexGuard<'_, T> {
    fn drop(&mut self) {
        // SAFETY: the guard is dropped exactly once, here, and never touched again.
        unsafe { ManuallyDrop::drop(&mut self.guard) };
        self.irq.pop_off();
    }
}
