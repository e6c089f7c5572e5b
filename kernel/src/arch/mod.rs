// src/arch/mod.rs
// Abstraction d'architecture - ce que l'ordonnanceur attend du matériel

use crate::scheduler::process::{ProcGuard, ProcHandle};

/// Index of a CPU running a dispatch loop
pub type CpuId = usize;

/// Interrupt masking with per-CPU nesting.
///
/// `push_off`/`pop_off` pairs nest; interrupts come back on only when the
/// outermost pair is popped and they were enabled before the first push.
pub trait InterruptControl: Sync {
    /// Disable interrupts and bump the nesting depth of this CPU
    fn push_off(&self);

    /// Drop one nesting level, restoring interrupts at depth zero
    fn pop_off(&self);

    /// Current nesting depth of this CPU
    fn irq_depth(&self) -> usize;

    /// Are interrupts enabled on this CPU?
    fn interrupts_enabled(&self) -> bool;
}

/// Hardware services the scheduler core runs on.
///
/// The context switch itself is assembly owned by the port; the core only
/// decides who runs and hands over the process lock.
pub trait Platform: InterruptControl {
    /// Unconditionally enable interrupts on this CPU
    fn enable_interrupts(&self);

    /// Halt until the next interrupt (`hlt` / `wfi`)
    fn wait_for_interrupt(&self);

    /// Switch from the dispatch loop of `cpu` into `proc`.
    ///
    /// `guard` is the process lock taken by the dispatch loop. Ownership of
    /// the held lock passes to the process: the implementation must
    /// `mem::forget` the guard, never drop it. The process releases the lock
    /// on its side, either when [`Scheduler::suspend`] returns and the caller
    /// drops its own guard, or, on the very first run, from the entry
    /// trampoline through [`Process::force_unlock`].
    ///
    /// Returns when the process gives the CPU back through
    /// [`Platform::switch_to_scheduler`]. At that point the process lock is
    /// held again, and the dispatch loop releases it.
    ///
    /// [`Scheduler::suspend`]: crate::scheduler::Scheduler::suspend
    /// [`Process::force_unlock`]: crate::scheduler::process::Process::force_unlock
    fn switch_to(&self, cpu: CpuId, proc: ProcHandle, guard: ProcGuard<'_>);

    /// Switch from `proc` back to the dispatch loop of `cpu`.
    ///
    /// Called with exactly the process lock held and interrupts off. The
    /// guard stays alive on the process stack; the lock itself is released
    /// by the dispatch loop once [`Platform::switch_to`] returns there.
    /// Execution continues here when the process is dispatched again, with
    /// the lock held by that dispatch.
    fn switch_to_scheduler(&self, cpu: CpuId, proc: ProcHandle);

    /// Monotonic timer ticks
    fn ticks(&self) -> u64;

    /// Write to the kernel console
    fn console_write(&self, s: &str);
}

/// `core::fmt::Write` adapter over the platform console
pub struct Console<'a, P: Platform + ?Sized>(pub &'a P);

impl<P: Platform + ?Sized> core::fmt::Write for Console<'_, P> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.0.console_write(s);
        Ok(())
    }
}
