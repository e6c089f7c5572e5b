//! Diagnostics - queue dumps, process listing, timed schedlog
//!
//! Queue line format, one line per (set, level):
//! `tick|active|level(level_quantum),[pid]name:state(quantum),...`
//! where `state` is the numeric process state.

use core::fmt::{self, Write};
use core::sync::atomic::Ordering;

use super::config::SchedulingPolicy;
use super::scheduler::Scheduler;
use crate::arch::Platform;
use crate::scheduler::process::{ProcInner, ProcState};
use crate::scheduler::queue::QueueSet;

fn write_entry(out: &mut dyn Write, p: &ProcInner) -> fmt::Result {
    write!(out, ",[{}]{}:{}({})", p.pid, p.name, p.state as u8, p.quantum)
}

impl<P: Platform> Scheduler<P> {
    /// Print the run queues (or the process table in FIFO mode)
    pub fn dump(&self, out: &mut dyn Write) -> fmt::Result {
        let tick = self.platform.ticks();

        match self.policy {
            SchedulingPolicy::Mqss => {
                let queues = self.lock_queues();
                for set in [QueueSet::Active, QueueSet::Expired] {
                    for level in 0..queues.levels() {
                        write!(
                            out,
                            "{}|{}|{}({})",
                            tick,
                            set.name(),
                            level,
                            queues.level_quantum(level, set)
                        )?;
                        for proc in queues.members(level, set) {
                            write_entry(out, &self.lock_proc(proc))?;
                        }
                        writeln!(out)?;
                    }
                }
            }
            SchedulingPolicy::RoundRobin => {
                let queues = self.lock_queues();
                write!(out, "{}|active|0(0)", tick)?;
                for proc in queues.members(0, QueueSet::Active) {
                    write_entry(out, &self.lock_proc(proc))?;
                }
                writeln!(out)?;
            }
            SchedulingPolicy::Fifo => {
                write!(out, "{}|active|0(0)", tick)?;
                for slot in self.procs.iter() {
                    let guard = slot.lock(self.irq());
                    if guard.state != ProcState::Unused {
                        write_entry(out, &guard)?;
                    }
                }
                writeln!(out)?;
            }
        }

        Ok(())
    }

    /// One line per live process: pid, state, name
    pub fn procdump(&self, out: &mut dyn Write) -> fmt::Result {
        writeln!(out)?;
        for slot in self.procs.iter() {
            let guard = slot.lock(self.irq());
            if guard.state == ProcState::Unused {
                continue;
            }
            writeln!(out, "{} {:<6} {}", guard.pid, guard.state, guard.name)?;
        }
        Ok(())
    }

    /// Dump the queues on every dispatch for the next `ticks` ticks
    pub fn start_schedlog(&self, ticks: u64) {
        self.schedlog.start.store(self.platform.ticks(), Ordering::Release);
        self.schedlog.duration.store(ticks, Ordering::Release);
        log::info!("[SCHED] schedlog enabled for {} ticks", ticks);
    }

    pub fn stop_schedlog(&self) {
        self.schedlog.duration.store(0, Ordering::Release);
    }

    /// Is a schedlog window open?
    pub fn schedlog_active(&self) -> bool {
        self.schedlog.duration.load(Ordering::Acquire) > 0
    }
}
