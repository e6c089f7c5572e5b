//! Scheduling Policies - FIFO scan, round robin, multi-level feedback
//!
//! - FIFO: scan the process table from where this CPU last stopped; no run
//!   queues, no quantum enforcement.
//! - RR: one queue, the process quantum is reset on every requeue.
//! - MQSS: several levels, each with an active and an expired queue. A
//!   process runs until its own quantum or its level's shared quantum runs
//!   out, then drops one level; when no level below has budget left it
//!   goes to the expired set at its original level. The sets are swapped
//!   once the active set holds nothing runnable.

use super::scheduler::Scheduler;
use crate::arch::{CpuId, Platform};
use crate::scheduler::process::{ProcGuard, ProcHandle};
use crate::scheduler::queue::{QueueSet, QueueStore};

pub use super::config::SchedulingPolicy;

/// Where a yielding process goes next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YieldDecision {
    /// Destination level
    pub level: usize,

    /// Destination set
    pub set: QueueSet,

    /// Refill the process quantum
    pub replenish: bool,

    /// Drain the rest of the current level along with the process
    pub cascade: bool,
}

/// Decide the destination of a process yielding from `level` of the active
/// set.
///
/// While both its own quantum and the level quantum remain, the process
/// simply goes to the tail of its level. Otherwise it drops to the first
/// lower level whose active quantum is still positive, or to the expired
/// set at `original_level` when none is. An exhausted level quantum also
/// drains the level's other occupants to the same destination.
pub fn decide_yield(
    store: &QueueStore,
    level: usize,
    original_level: usize,
    proc_quantum_left: i32,
) -> YieldDecision {
    let level_exhausted = store.level_quantum(level, QueueSet::Active) <= 0;

    if !level_exhausted && proc_quantum_left > 0 {
        return YieldDecision {
            level,
            set: QueueSet::Active,
            replenish: false,
            cascade: false,
        };
    }

    let lower = (level + 1..store.levels())
        .find(|&lower| store.level_quantum(lower, QueueSet::Active) > 0);

    let (level, set) = match lower {
        Some(lower) => (lower, QueueSet::Active),
        None => (original_level, QueueSet::Expired),
    };

    YieldDecision {
        level,
        set,
        replenish: true,
        cascade: level_exhausted,
    }
}

impl<P: Platform> Scheduler<P> {
    /// Choose the next process for `cpu`.
    ///
    /// On success the process is returned still `Runnable` with its lock
    /// held; the queue lock has already been released.
    pub fn pick_next(&self, cpu: CpuId) -> Option<(ProcHandle, ProcGuard<'_>)> {
        match self.policy {
            SchedulingPolicy::Fifo => self.pick_fifo(cpu),
            SchedulingPolicy::RoundRobin => self.pick_queued(1),
            SchedulingPolicy::Mqss => self.pick_queued(self.config.levels),
        }
    }

    fn pick_fifo(&self, cpu: CpuId) -> Option<(ProcHandle, ProcGuard<'_>)> {
        let slots = self.procs.len();
        let start = self.with_cpu(cpu, |state| state.fifo_cursor);

        for offset in 0..slots {
            let index = (start + offset) % slots;
            let proc = ProcHandle::new(index);
            let guard = self.lock_proc(proc);
            if guard.state.is_schedulable() {
                self.with_cpu(cpu, |state| state.fifo_cursor = (index + 1) % slots);
                return Some((proc, guard));
            }
        }

        None
    }

    /// Scan the active set from level 0 down, swapping sets first when it
    /// holds nothing runnable.
    fn pick_queued(&self, levels: usize) -> Option<(ProcHandle, ProcGuard<'_>)> {
        let mut queues = self.lock_queues();

        if self.policy == SchedulingPolicy::Mqss && !self.active_has_runnable(&queues, levels) {
            queues.swap_sets(|proc| self.lock_proc(proc).state.is_live());
            self.stats.record_swap();
            log::debug!("[SCHED] active set starved, swapped with expired set");
        }

        let mut picked = None;
        'scan: for level in 0..levels {
            for proc in queues.members(level, QueueSet::Active) {
                let guard = self.lock_proc(proc);
                if guard.state.is_schedulable() {
                    picked = Some((proc, guard));
                    break 'scan;
                }
            }
        }

        drop(queues);
        picked
    }

    fn active_has_runnable(&self, queues: &QueueStore, levels: usize) -> bool {
        (0..levels).any(|level| {
            queues
                .members(level, QueueSet::Active)
                .any(|proc| self.lock_proc(proc).state.is_schedulable())
        })
    }
}
