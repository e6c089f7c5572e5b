//! Queue Store - per-level active/expired run queues
//!
//! Passive data guarded by the global queue lock: queue ends for both sets of
//! every level, the shared level quantums, and the link arena indexed by
//! [`ProcHandle`]. Holding `&mut QueueStore` is holding the queue lock.

use alloc::vec;
use alloc::vec::Vec;

use crate::scheduler::process::ProcHandle;

/// Which of the two sets of a level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueSet {
    /// Processes eligible for dispatch
    Active,
    /// Processes waiting for the next swap
    Expired,
}

impl QueueSet {
    pub fn from_expired(expired: bool) -> Self {
        if expired {
            Self::Expired
        } else {
            Self::Active
        }
    }

    pub fn is_expired(self) -> bool {
        matches!(self, Self::Expired)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
        }
    }
}

/// Head and tail of one (level, set) queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) struct QueueEnds {
    pub(super) head: Option<ProcHandle>,
    pub(super) tail: Option<ProcHandle>,
}

/// Queue-side fields of a process record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLinks {
    /// Level the process is linked at; `None` when not enqueued
    pub priority_level: Option<usize>,

    /// Home level used when demoted into the expired set
    pub original_level: usize,

    /// Linked into the expired set rather than the active one
    pub in_expired_set: bool,

    pub(super) prev: Option<ProcHandle>,
    pub(super) next: Option<ProcHandle>,
}

impl QueueLinks {
    const fn detached() -> Self {
        Self {
            priority_level: None,
            original_level: 0,
            in_expired_set: false,
            prev: None,
            next: None,
        }
    }
}

/// All run queues of the scheduler
pub struct QueueStore {
    pub(super) levels: usize,
    pub(super) level_quantum: i32,
    pub(super) active: Vec<QueueEnds>,
    pub(super) expired: Vec<QueueEnds>,
    pub(super) active_quantum: Vec<i32>,
    pub(super) expired_quantum: Vec<i32>,
    pub(super) links: Vec<QueueLinks>,
}

impl QueueStore {
    /// Empty queues for `levels` levels and `nproc` process slots; every
    /// level quantum starts at `level_quantum`.
    pub fn new(levels: usize, level_quantum: i32, nproc: usize) -> Self {
        Self {
            levels,
            level_quantum,
            active: vec![QueueEnds::default(); levels],
            expired: vec![QueueEnds::default(); levels],
            active_quantum: vec![level_quantum; levels],
            expired_quantum: vec![level_quantum; levels],
            links: vec![QueueLinks::detached(); nproc],
        }
    }

    pub fn levels(&self) -> usize {
        self.levels
    }

    /// Queue-side record of `proc`
    pub fn links(&self, proc: ProcHandle) -> &QueueLinks {
        &self.links[proc.index()]
    }

    /// Reset the queue-side record of a freshly allocated slot
    pub fn init_links(&mut self, proc: ProcHandle, original_level: usize) {
        crate::sched_assert!(
            original_level < self.levels,
            "original level {} out of range",
            original_level
        );
        crate::sched_assert!(!self.is_linked(proc), "reinitializing a linked process");
        self.links[proc.index()] = QueueLinks {
            original_level,
            ..QueueLinks::detached()
        };
    }

    pub fn is_linked(&self, proc: ProcHandle) -> bool {
        self.links[proc.index()].priority_level.is_some()
    }

    /// (level, set) `proc` is linked into
    pub fn location(&self, proc: ProcHandle) -> Option<(usize, QueueSet)> {
        let links = &self.links[proc.index()];
        links
            .priority_level
            .map(|level| (level, QueueSet::from_expired(links.in_expired_set)))
    }

    pub(super) fn ends(&self, level: usize, set: QueueSet) -> &QueueEnds {
        match set {
            QueueSet::Active => &self.active[level],
            QueueSet::Expired => &self.expired[level],
        }
    }

    pub(super) fn ends_mut(&mut self, level: usize, set: QueueSet) -> &mut QueueEnds {
        match set {
            QueueSet::Active => &mut self.active[level],
            QueueSet::Expired => &mut self.expired[level],
        }
    }

    pub fn head(&self, level: usize, set: QueueSet) -> Option<ProcHandle> {
        self.ends(level, set).head
    }

    pub fn tail(&self, level: usize, set: QueueSet) -> Option<ProcHandle> {
        self.ends(level, set).tail
    }

    /// Members of one queue, head first
    pub fn members(&self, level: usize, set: QueueSet) -> Members<'_> {
        Members {
            store: self,
            cursor: self.head(level, set),
        }
    }

    /// Remaining shared quantum of a level
    pub fn level_quantum(&self, level: usize, set: QueueSet) -> i32 {
        match set {
            QueueSet::Active => self.active_quantum[level],
            QueueSet::Expired => self.expired_quantum[level],
        }
    }

    pub fn set_level_quantum(&mut self, level: usize, set: QueueSet, value: i32) {
        match set {
            QueueSet::Active => self.active_quantum[level] = value,
            QueueSet::Expired => self.expired_quantum[level] = value,
        }
    }

    /// Charge one tick to a level; returns what is left
    pub fn charge_level(&mut self, level: usize, set: QueueSet) -> i32 {
        let quantum = match set {
            QueueSet::Active => &mut self.active_quantum[level],
            QueueSet::Expired => &mut self.expired_quantum[level],
        };
        *quantum -= 1;
        *quantum
    }

    /// Check structural invariants: every linked process sits in exactly
    /// the queue its level/set names, links are symmetric, ends agree.
    pub fn check_invariants(&self) -> Result<(), &'static str> {
        let mut seen = vec![false; self.links.len()];

        for set in [QueueSet::Active, QueueSet::Expired] {
            for level in 0..self.levels {
                let ends = self.ends(level, set);
                let mut prev = None;
                let mut cursor = ends.head;
                let mut steps = 0;

                while let Some(proc) = cursor {
                    steps += 1;
                    if steps > self.links.len() {
                        return Err("queue contains a cycle");
                    }
                    if core::mem::replace(&mut seen[proc.index()], true) {
                        return Err("process linked twice");
                    }
                    let links = &self.links[proc.index()];
                    if links.priority_level != Some(level) {
                        return Err("priority level disagrees with queue");
                    }
                    if links.in_expired_set != set.is_expired() {
                        return Err("expired flag disagrees with queue");
                    }
                    if links.prev != prev {
                        return Err("back link broken");
                    }
                    prev = cursor;
                    cursor = links.next;
                }

                if ends.tail != prev {
                    return Err("tail does not match last member");
                }
            }
        }

        for (index, links) in self.links.iter().enumerate() {
            if links.priority_level.is_some() != seen[index] {
                return Err("linked process missing from its queue");
            }
            if !seen[index] && (links.prev.is_some() || links.next.is_some()) {
                return Err("unlinked process keeps stale links");
            }
        }

        Ok(())
    }
}

/// Iterator over one queue
pub struct Members<'a> {
    store: &'a QueueStore,
    cursor: Option<ProcHandle>,
}

impl Iterator for Members<'_> {
    type Item = ProcHandle;

    fn next(&mut self) -> Option<ProcHandle> {
        let proc = self.cursor?;
        self.cursor = self.store.links[proc.index()].next;
        Some(proc)
    }
}
