//! Lifecycle hooks - create, yield, sleep, wake, kill, exit, reap
//!
//! Hooks keep their process-lock and queue-lock sections disjoint, except
//! when a woken process is relinked: its state is checked again under both.

use alloc::string::String;

use super::config::SchedulingPolicy;
use super::error::{SchedulerError, SchedulerResult};
use super::policy::decide_yield;
use super::scheduler::Scheduler;
use crate::arch::{CpuId, Platform};
use crate::scheduler::process::{Pid, ProcGuard, ProcHandle, ProcState, WaitChannel};
use crate::scheduler::queue::QueueSet;
use crate::sync::{IrqMutex, IrqMutexGuard};

impl<P: Platform> Scheduler<P> {
    /// Allocate a process slot in state `Used`.
    ///
    /// `priority` is the home level; `None` selects the configured starting
    /// level. The process is not runnable until [`Scheduler::activate`].
    pub fn create(
        &self,
        name: &str,
        priority: Option<usize>,
        parent: Option<Pid>,
    ) -> SchedulerResult<ProcHandle> {
        let level = match priority {
            None => self.config.starting_level,
            Some(level) if level < self.config.levels => level,
            Some(value) => {
                return Err(SchedulerError::InvalidPriority {
                    value,
                    levels: self.config.levels,
                })
            }
        };

        let (proc, mut guard) = self
            .procs
            .alloc(self.irq())
            .ok_or(SchedulerError::ProcessTableFull { max: self.procs.len() })?;
        guard.name = String::from(name);
        guard.quantum = self.config.proc_quantum;
        guard.parent = parent;
        let pid = guard.pid;
        drop(guard);

        self.lock_queues().init_links(proc, level);

        log::debug!("[SCHED] created pid {} '{}' at level {}", pid, name, level);
        Ok(proc)
    }

    /// Mark a freshly created process runnable and queue it at its original
    /// level in the active set.
    pub fn activate(&self, proc: ProcHandle) {
        let mut guard = self.lock_proc(proc);
        crate::sched_assert!(
            guard.state == ProcState::Used,
            "activate: pid {} is {}, not freshly created",
            guard.pid,
            guard.state
        );
        guard.set_state(ProcState::Runnable);
        drop(guard);

        if self.policy.uses_queues() {
            let mut queues = self.lock_queues();
            let level = queues.links(proc).original_level;
            queues.enqueue(proc, level, QueueSet::Active);
        }
        self.stats.record_fork();
    }

    /// Create and activate a process at the starting level
    pub fn fork(&self, name: &str, parent: Option<Pid>) -> SchedulerResult<ProcHandle> {
        let proc = self.create(name, None, parent)?;
        self.activate(proc);
        Ok(proc)
    }

    /// Create and activate a process at an explicit level
    pub fn priofork(
        &self,
        name: &str,
        priority: usize,
        parent: Option<Pid>,
    ) -> SchedulerResult<ProcHandle> {
        let proc = self.create(name, Some(priority), parent)?;
        self.activate(proc);
        Ok(proc)
    }

    /// Give up the CPU for one scheduling round.
    pub fn yield_now(&self, cpu: CpuId) {
        let proc = self.expect_current(cpu, "yield");
        self.stats.record_yield();

        let replenish = match self.policy {
            SchedulingPolicy::Fifo => false,
            SchedulingPolicy::RoundRobin => {
                let mut queues = self.lock_queues();
                let level = queues.links(proc).original_level;
                queues.enqueue(proc, level, QueueSet::Active);
                true
            }
            SchedulingPolicy::Mqss => self.requeue_yielding(proc),
        };

        let mut guard = self.lock_proc(proc);
        if replenish {
            guard.quantum = self.config.proc_quantum;
        }
        guard.set_state(ProcState::Runnable);
        drop(self.suspend(cpu, proc, guard));
    }

    /// Relink a yielding MQSS process; returns whether its quantum is due
    /// for a refill.
    fn requeue_yielding(&self, proc: ProcHandle) -> bool {
        let (pid, quantum_left) = self.with_process(proc, |p| (p.pid, p.quantum));

        let mut queues = self.lock_queues();
        let Some((level, _)) = queues.location(proc) else {
            panic!("[SCHED CRITICAL] yield: pid {} is not queued", pid);
        };
        let original_level = queues.links(proc).original_level;
        let decision = decide_yield(&queues, level, original_level, quantum_left);

        if decision.cascade {
            let moved = queues.move_level_processes(level, decision.level, decision.set, Some(proc));
            self.stats.record_cascade(moved);
            log::debug!(
                "[SCHED] level {} exhausted, {} processes follow pid {} to {} level {}",
                level,
                moved,
                pid,
                decision.set.name(),
                decision.level
            );
        }

        if decision.set.is_expired() {
            self.stats.record_expiration();
        } else if decision.level != level {
            self.stats.record_demotion();
        }

        queues.enqueue(proc, decision.level, decision.set);
        decision.replenish
    }

    /// Switch from the current process of `cpu` back to its dispatch loop.
    ///
    /// The caller holds exactly the process lock, with interrupts off, and
    /// has already moved the process out of `Running`. Returns with the lock
    /// held once the process is scheduled again.
    pub fn suspend<'a>(&'a self, cpu: CpuId, proc: ProcHandle, guard: ProcGuard<'a>) -> ProcGuard<'a> {
        crate::sched_assert!(
            guard.state != ProcState::Running,
            "suspend: pid {} still running",
            guard.pid
        );
        crate::sched_assert!(
            self.platform.irq_depth() == 1,
            "suspend: {} locks held",
            self.platform.irq_depth()
        );
        crate::sched_assert!(!self.platform.interrupts_enabled(), "suspend: interrupts enabled");

        self.platform.switch_to_scheduler(cpu, proc);
        guard
    }

    /// Sleep on `chan`, atomically releasing the caller's condition lock.
    ///
    /// The process lock is taken before `cond_guard` is released so a
    /// `wakeup` cannot run in between; the condition lock is re-acquired
    /// before returning. The process stays queued while it sleeps.
    pub fn sleep<'a, T>(
        &'a self,
        cpu: CpuId,
        chan: WaitChannel,
        cond: &'a IrqMutex<T>,
        cond_guard: IrqMutexGuard<'a, T>,
    ) -> IrqMutexGuard<'a, T> {
        let proc = self.expect_current(cpu, "sleep");

        let mut guard = self.lock_proc(proc);
        drop(cond_guard);

        guard.chan = Some(chan);
        guard.set_state(ProcState::Sleeping);
        log::trace!("[SCHED] pid {} sleeps on {:#x}", guard.pid, chan);
        drop(self.suspend(cpu, proc, guard));

        cond.lock(self.irq())
    }

    /// Wake every process sleeping on `chan`; returns how many woke.
    pub fn wakeup(&self, chan: WaitChannel) -> usize {
        let mut woken = 0;

        for slot in self.procs.iter() {
            let mut guard = slot.lock(self.irq());
            if guard.state == ProcState::Sleeping && guard.chan == Some(chan) {
                self.make_runnable(&mut guard);
                let pid = guard.pid;
                drop(guard);
                self.requeue_woken(slot.handle(), pid);
                woken += 1;
            }
        }

        woken
    }

    /// Set the killed flag of `pid`; a sleeping victim is woken so it can
    /// notice.
    pub fn kill(&self, pid: Pid) -> SchedulerResult<()> {
        for slot in self.procs.iter() {
            let mut guard = slot.lock(self.irq());
            if !guard.state.is_live() || guard.pid != pid {
                continue;
            }

            guard.killed = true;
            self.stats.record_kill();
            log::debug!("[SCHED] kill pid {} ({})", pid, guard.state);

            if guard.state == ProcState::Sleeping {
                self.make_runnable(&mut guard);
                drop(guard);
                self.requeue_woken(slot.handle(), pid);
            }
            return Ok(());
        }

        Err(SchedulerError::NoSuchProcess { pid })
    }

    fn make_runnable(&self, guard: &mut ProcGuard<'_>) {
        guard.set_state(ProcState::Runnable);
        guard.chan = None;
        if self.policy == SchedulingPolicy::RoundRobin {
            guard.quantum = self.config.proc_quantum;
        }
        self.stats.record_wakeup();
    }

    /// Relink a woken process into the active set at its current level.
    ///
    /// The process lock was dropped before the queue lock is taken, so the
    /// process may have run, exited or been reaped in between. It is only
    /// relinked if the slot still holds `pid` waiting for the CPU.
    fn requeue_woken(&self, proc: ProcHandle, pid: Pid) {
        if !self.policy.uses_queues() {
            return;
        }

        let mut queues = self.lock_queues();
        let guard = self.lock_proc(proc);
        let waiting = matches!(guard.state, ProcState::Runnable | ProcState::Sleeping);
        if guard.pid != pid || !waiting {
            log::trace!("[SCHED] pid {} left before its wakeup was queued ({})", pid, guard.state);
            return;
        }

        let links = queues.links(proc);
        let level = links.priority_level.unwrap_or(links.original_level);
        queues.enqueue(proc, level, QueueSet::Active);
    }

    /// Cooperative kill flag
    pub fn killed(&self, proc: ProcHandle) -> bool {
        self.with_process(proc, |p| p.killed)
    }

    pub fn set_killed(&self, proc: ProcHandle) {
        self.with_process(proc, |p| p.killed = true);
    }

    /// Terminate the current process of `cpu`.
    ///
    /// The process leaves the run queues before it becomes a zombie. On
    /// real hardware the final switch never comes back.
    pub fn exit(&self, cpu: CpuId, status: i32) {
        let proc = self.expect_current(cpu, "exit");

        if self.policy.uses_queues() {
            self.lock_queues().dequeue(proc);
        }

        let mut guard = self.lock_proc(proc);
        guard.exit_status = status;
        guard.set_state(ProcState::Zombie);
        self.stats.record_exit();
        log::debug!("[SCHED] pid {} exits with status {}", guard.pid, status);
        drop(self.suspend(cpu, proc, guard));
    }

    /// Free a zombie slot, returning its pid and exit status
    pub fn reap(&self, proc: ProcHandle) -> SchedulerResult<(Pid, i32)> {
        let mut guard = self.lock_proc(proc);
        if guard.state != ProcState::Zombie {
            return Err(SchedulerError::NotZombie { pid: guard.pid });
        }

        let reaped = (guard.pid, guard.exit_status);
        guard.reset();
        Ok(reaped)
    }

    /// Charge one timer tick to the current process of `cpu`.
    ///
    /// Returns whether the process should now yield. Idle CPUs are never
    /// asked to yield.
    pub fn charge_tick(&self, cpu: CpuId) -> bool {
        let Some(proc) = self.current(cpu) else {
            return false;
        };

        let quantum_left = self.with_process(proc, |p| {
            // FIFO never refills the quantum.
            p.quantum = p.quantum.saturating_sub(1);
            p.quantum
        });

        match self.policy {
            SchedulingPolicy::Fifo => true,
            SchedulingPolicy::RoundRobin => quantum_left <= 0,
            SchedulingPolicy::Mqss => {
                let mut queues = self.lock_queues();
                let level_left = match queues.location(proc) {
                    Some((level, set)) => queues.charge_level(level, set),
                    None => 1,
                };
                quantum_left <= 0 || level_left <= 0
            }
        }
    }
}
