//! Scheduler Core - per-CPU dispatch loop
//!
//! Owns the process table, the run queues and the per-CPU records. Each CPU
//! runs [`Scheduler::run`] forever: enable interrupts, pick a process, mark
//! it running, switch to it, and start over when it gives the CPU back.
//!
//! The process lock crosses every context switch: the dispatch loop takes it
//! and the process releases it, the process takes it and the dispatch loop
//! releases it once the switch comes back.
//!
//! # Lock ordering
//! 1. queue lock (global)
//! 2. process lock
//! 3. per-CPU record lock (leaf, never held while taking another lock)
//!
//! The queue lock and a process lock are only held together while scanning
//! for a runnable process, probing liveness during a set swap, relinking a
//! woken process, and dumping.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use super::config::{SchedConfig, SchedulingPolicy};
use super::error::SchedulerResult;
use super::statistics::SchedulerStats;
use crate::arch::{Console, CpuId, InterruptControl, Platform};
use crate::scheduler::process::{Pid, ProcGuard, ProcHandle, ProcInner, ProcState, ProcTable};
use crate::scheduler::queue::QueueStore;
use crate::sync::{IrqMutex, IrqMutexGuard};

/// Per-CPU record
#[derive(Debug, Default)]
pub(super) struct CpuState {
    /// Process running on this CPU, if any
    pub(super) current: Option<ProcHandle>,

    /// Next table slot examined by the FIFO scan
    pub(super) fifo_cursor: usize,
}

/// Outcome of one dispatch round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A process ran and gave the CPU back
    Ran(ProcHandle),
    /// Nothing was runnable; the CPU waited for an interrupt
    Idle,
}

/// Tick window during which every dispatch dumps the queues
pub(super) struct SchedLog {
    pub(super) start: AtomicU64,
    /// Window length in ticks; 0 when closed
    pub(super) duration: AtomicU64,
}

/// The scheduler
pub struct Scheduler<P: Platform> {
    pub(super) config: SchedConfig,
    pub(super) policy: SchedulingPolicy,
    pub(super) platform: P,
    pub(super) procs: ProcTable,
    pub(super) queues: IrqMutex<QueueStore>,
    pub(super) cpus: Vec<IrqMutex<CpuState>>,
    pub(super) stats: SchedulerStats,
    pub(super) schedlog: SchedLog,
}

impl<P: Platform> Scheduler<P> {
    /// Build a scheduler over `platform`. The configuration is validated
    /// once; the policy never changes afterwards.
    pub fn new(config: SchedConfig, platform: P) -> SchedulerResult<Self> {
        config.validate()?;
        let policy = config.effective_policy();

        log::info!(
            "[SCHED] {} scheduler: {} levels, level quantum {}, proc quantum {}, {} slots, {} cpus",
            policy.name(),
            config.levels,
            config.level_quantum,
            config.proc_quantum,
            config.max_procs,
            config.ncpu
        );

        Ok(Self {
            config,
            policy,
            platform,
            procs: ProcTable::new(config.max_procs),
            queues: IrqMutex::new(QueueStore::new(
                config.levels,
                config.level_quantum,
                config.max_procs,
            )),
            cpus: (0..config.ncpu).map(|_| IrqMutex::new(CpuState::default())).collect(),
            stats: SchedulerStats::new(),
            schedlog: SchedLog {
                start: AtomicU64::new(0),
                duration: AtomicU64::new(0),
            },
        })
    }

    pub fn config(&self) -> &SchedConfig {
        &self.config
    }

    /// Policy in effect
    pub fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    pub fn procs(&self) -> &ProcTable {
        &self.procs
    }

    pub(super) fn irq(&self) -> &dyn InterruptControl {
        &self.platform
    }

    pub(super) fn lock_queues(&self) -> IrqMutexGuard<'_, QueueStore> {
        self.queues.lock(self.irq())
    }

    pub(super) fn lock_proc(&self, proc: ProcHandle) -> ProcGuard<'_> {
        self.procs.get(proc).lock(self.irq())
    }

    fn cpu(&self, cpu: CpuId) -> &IrqMutex<CpuState> {
        crate::sched_assert!(cpu < self.cpus.len(), "cpu {} out of range", cpu);
        &self.cpus[cpu]
    }

    pub(super) fn with_cpu<R>(&self, cpu: CpuId, f: impl FnOnce(&mut CpuState) -> R) -> R {
        let mut state = self.cpu(cpu).lock(self.irq());
        f(&mut state)
    }

    /// Process running on `cpu`
    pub fn current(&self, cpu: CpuId) -> Option<ProcHandle> {
        self.with_cpu(cpu, |state| state.current)
    }

    /// Current process of `cpu`; calling `op` without one is a kernel bug.
    pub(super) fn expect_current(&self, cpu: CpuId, op: &str) -> ProcHandle {
        match self.current(cpu) {
            Some(proc) => proc,
            None => panic!("[SCHED CRITICAL] {}: no current process on cpu {}", op, cpu),
        }
    }

    /// Run `f` with the queue lock held
    pub fn with_queues<R>(&self, f: impl FnOnce(&mut QueueStore) -> R) -> R {
        let mut queues = self.lock_queues();
        f(&mut queues)
    }

    /// Run `f` with the lock of `proc` held
    pub fn with_process<R>(&self, proc: ProcHandle, f: impl FnOnce(&mut ProcInner) -> R) -> R {
        let mut guard = self.lock_proc(proc);
        f(&mut guard)
    }

    pub fn state(&self, proc: ProcHandle) -> ProcState {
        self.with_process(proc, |p| p.state)
    }

    pub fn pid(&self, proc: ProcHandle) -> Pid {
        self.with_process(proc, |p| p.pid)
    }

    pub fn quantum(&self, proc: ProcHandle) -> i32 {
        self.with_process(proc, |p| p.quantum)
    }

    /// Live process carrying `pid`
    pub fn find(&self, pid: Pid) -> Option<ProcHandle> {
        self.procs.find(pid, self.irq())
    }

    /// One round of the dispatch loop on `cpu`.
    pub fn dispatch_once(&self, cpu: CpuId) -> Dispatch {
        // Avoid deadlock by letting devices interrupt between rounds.
        self.platform.enable_interrupts();

        let Some((proc, mut guard)) = self.pick_next(cpu) else {
            self.stats.record_idle();
            self.platform.wait_for_interrupt();
            return Dispatch::Idle;
        };

        crate::sched_assert!(
            guard.state == ProcState::Runnable,
            "dispatch: picked pid {} in state {}",
            guard.pid,
            guard.state
        );
        guard.set_state(ProcState::Running);
        self.with_cpu(cpu, |state| state.current = Some(proc));
        self.stats.record_pick();
        log::trace!("[SCHED] cpu {} runs pid {}", cpu, guard.pid);
        drop(guard);

        self.log_dispatch();

        let guard = self.lock_proc(proc);
        self.platform.switch_to(cpu, proc, guard);

        // Back from the process, which switched away holding its own lock.
        self.with_cpu(cpu, |state| state.current = None);
        // SAFETY: the process took its lock before `switch_to_scheduler` and
        // left the guard on its own stack; nothing on this CPU refers to it.
        unsafe { self.procs.get(proc).force_unlock(self.irq()) };
        Dispatch::Ran(proc)
    }

    /// Dispatch loop of `cpu`; never returns
    pub fn run(&self, cpu: CpuId) -> ! {
        log::info!("[SCHED] cpu {} entering dispatch loop", cpu);
        loop {
            self.dispatch_once(cpu);
        }
    }

    /// Dump the queues while a schedlog window is open
    fn log_dispatch(&self) {
        let duration = self.schedlog.duration.load(Ordering::Acquire);
        if duration == 0 {
            return;
        }

        let elapsed = self
            .platform
            .ticks()
            .saturating_sub(self.schedlog.start.load(Ordering::Acquire));
        if elapsed < duration {
            let _ = self.dump(&mut Console(&self.platform));
        } else {
            self.schedlog.duration.store(0, Ordering::Release);
        }
    }
}
