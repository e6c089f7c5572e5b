//! Queue Manager - link, unlink, level drain and set swap
//!
//! Every operation takes `&mut QueueStore`, i.e. the caller holds the queue
//! lock. Level indices are trusted: an out-of-range level aborts.

use super::store::{QueueSet, QueueStore};
use crate::scheduler::process::ProcHandle;

impl QueueStore {
    /// Link `proc` at the tail of (`level`, `set`), unlinking it first if
    /// it is queued anywhere else.
    pub fn enqueue(&mut self, proc: ProcHandle, level: usize, set: QueueSet) {
        crate::sched_assert!(level < self.levels, "enqueue: invalid level {}", level);

        if self.is_linked(proc) {
            self.unlink(proc);
        }
        self.link_tail(proc, level, set);
    }

    /// Unlink `proc` from whatever queue it occupies. No-op when unlinked.
    pub fn dequeue(&mut self, proc: ProcHandle) {
        if self.is_linked(proc) {
            self.unlink(proc);
        }
    }

    /// Drain the active queue of `from_level` into `to_level` of `to_set`,
    /// leaving `skip` in place. Processes sent to the expired set land at
    /// their own original level instead of `to_level`.
    ///
    /// Returns how many processes moved.
    pub fn move_level_processes(
        &mut self,
        from_level: usize,
        to_level: usize,
        to_set: QueueSet,
        skip: Option<ProcHandle>,
    ) -> usize {
        crate::sched_assert!(from_level < self.levels, "move: invalid level {}", from_level);
        crate::sched_assert!(to_level < self.levels, "move: invalid level {}", to_level);
        crate::sched_assert!(
            to_set.is_expired() || to_level != from_level,
            "move: level {} onto itself",
            from_level
        );

        let mut moved = 0;
        let mut cursor = self.active[from_level].head;

        while let Some(proc) = cursor {
            cursor = self.links[proc.index()].next;
            if Some(proc) == skip {
                continue;
            }

            let target = match to_set {
                QueueSet::Active => to_level,
                QueueSet::Expired => self.links[proc.index()].original_level,
            };
            self.unlink(proc);
            self.link_tail(proc, target, to_set);
            moved += 1;
        }

        moved
    }

    /// Exchange the active and expired sets wholesale.
    ///
    /// The queue arrays trade places, so every process's notion of which set
    /// it is in flips as well: linked processes always, unlinked ones when
    /// `is_live` says the slot holds a process. Newly active level quantums
    /// are refilled.
    pub fn swap_sets(&mut self, mut is_live: impl FnMut(ProcHandle) -> bool) {
        core::mem::swap(&mut self.active, &mut self.expired);
        core::mem::swap(&mut self.active_quantum, &mut self.expired_quantum);

        let refill = self.level_quantum;
        self.active_quantum.iter_mut().for_each(|quantum| *quantum = refill);

        for index in 0..self.links.len() {
            let proc = ProcHandle::new(index);
            if self.links[index].priority_level.is_some() || is_live(proc) {
                let links = &mut self.links[index];
                links.in_expired_set = !links.in_expired_set;
            }
        }
    }

    fn link_tail(&mut self, proc: ProcHandle, level: usize, set: QueueSet) {
        let tail = self.tail(level, set);

        {
            let links = &mut self.links[proc.index()];
            links.priority_level = Some(level);
            links.in_expired_set = set.is_expired();
            links.prev = tail;
            links.next = None;
        }

        match tail {
            Some(tail) => self.links[tail.index()].next = Some(proc),
            None => self.ends_mut(level, set).head = Some(proc),
        }
        self.ends_mut(level, set).tail = Some(proc);
    }

    fn unlink(&mut self, proc: ProcHandle) {
        let links = self.links[proc.index()];
        let Some(level) = links.priority_level else {
            return;
        };
        let set = QueueSet::from_expired(links.in_expired_set);

        match links.prev {
            Some(prev) => self.links[prev.index()].next = links.next,
            None => self.ends_mut(level, set).head = links.next,
        }
        match links.next {
            Some(next) => self.links[next.index()].prev = links.prev,
            None => self.ends_mut(level, set).tail = links.prev,
        }

        let links = &mut self.links[proc.index()];
        links.priority_level = None;
        links.prev = None;
        links.next = None;
    }
}
