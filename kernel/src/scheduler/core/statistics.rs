//! Statistics - Scheduler event counters
//!
//! Lock-free counters bumped on the scheduling paths; never read back by
//! the scheduler itself.

use core::sync::atomic::{AtomicU64, Ordering};

/// Scheduler statistics
pub struct SchedulerStats {
    /// Successful picks (process handed to a CPU)
    pub total_picks: AtomicU64,

    /// Dispatch rounds that found nothing runnable
    pub idle_rounds: AtomicU64,

    /// Active/expired swaps
    pub swaps: AtomicU64,

    /// Yields handled
    pub yields: AtomicU64,

    /// Yields that moved the process to a lower active level
    pub demotions: AtomicU64,

    /// Yields that sent the process to the expired set
    pub expirations: AtomicU64,

    /// Level drains triggered by an exhausted level quantum
    pub cascades: AtomicU64,

    /// Processes moved by level drains
    pub cascaded_procs: AtomicU64,

    /// Sleepers made runnable by wakeup or kill
    pub wakeups: AtomicU64,

    /// Kill requests delivered
    pub kills: AtomicU64,

    /// Processes made runnable for the first time
    pub forks: AtomicU64,

    /// Processes that exited
    pub exits: AtomicU64,
}

/// Plain copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_picks: u64,
    pub idle_rounds: u64,
    pub swaps: u64,
    pub yields: u64,
    pub demotions: u64,
    pub expirations: u64,
    pub cascades: u64,
    pub cascaded_procs: u64,
    pub wakeups: u64,
    pub kills: u64,
    pub forks: u64,
    pub exits: u64,
}

impl SchedulerStats {
    pub const fn new() -> Self {
        Self {
            total_picks: AtomicU64::new(0),
            idle_rounds: AtomicU64::new(0),
            swaps: AtomicU64::new(0),
            yields: AtomicU64::new(0),
            demotions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            cascades: AtomicU64::new(0),
            cascaded_procs: AtomicU64::new(0),
            wakeups: AtomicU64::new(0),
            kills: AtomicU64::new(0),
            forks: AtomicU64::new(0),
            exits: AtomicU64::new(0),
        }
    }

    pub fn record_pick(&self) {
        self.total_picks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_idle(&self) {
        self.idle_rounds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_swap(&self) {
        self.swaps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_yield(&self) {
        self.yields.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_demotion(&self) {
        self.demotions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a level drain that moved `moved` other processes
    pub fn record_cascade(&self, moved: usize) {
        self.cascades.fetch_add(1, Ordering::Relaxed);
        self.cascaded_procs.fetch_add(moved as u64, Ordering::Relaxed);
    }

    pub fn record_wakeup(&self) {
        self.wakeups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_kill(&self) {
        self.kills.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fork(&self) {
        self.forks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_exit(&self) {
        self.exits.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy every counter
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_picks: self.total_picks.load(Ordering::Relaxed),
            idle_rounds: self.idle_rounds.load(Ordering::Relaxed),
            swaps: self.swaps.load(Ordering::Relaxed),
            yields: self.yields.load(Ordering::Relaxed),
            demotions: self.demotions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            cascades: self.cascades.load(Ordering::Relaxed),
            cascaded_procs: self.cascaded_procs.load(Ordering::Relaxed),
            wakeups: self.wakeups.load(Ordering::Relaxed),
            kills: self.kills.load(Ordering::Relaxed),
            forks: self.forks.load(Ordering::Relaxed),
            exits: self.exits.load(Ordering::Relaxed),
        }
    }
}

impl Default for SchedulerStats {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsSnapshot {
    /// Share of dispatch rounds that ran something (percentage)
    pub fn utilization(&self) -> u8 {
        let total = self.total_picks + self.idle_rounds;
        if total > 0 {
            ((self.total_picks * 100) / total) as u8
        } else {
            0
        }
    }
}
