// tests/common/mod.rs
// Plateforme simulée : chaque thread hôte joue un CPU

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use mqss_kernel::arch::{CpuId, InterruptControl, Platform};
use mqss_kernel::scheduler::process::ProcGuard;
use mqss_kernel::scheduler::{Dispatch, ProcHandle, ProcState, QueueSet, SchedConfig, Scheduler};
use mqss_kernel::sync::IrqMutex;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    static ENABLED: Cell<bool> = const { Cell::new(false) };
    static SAVED: Cell<bool> = const { Cell::new(false) };
}

/// What a process does once it gets the CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Give the CPU back immediately
    Yield,
    /// Consume `n` timer ticks, then yield
    Burn(u32),
    /// Sleep on a channel
    Sleep(usize),
    /// Terminate with a status
    Exit(i32),
}

pub type TestScheduler = Scheduler<TestPlatform>;

type PushHook = Box<dyn FnOnce(&TestScheduler) + Send>;

pub struct TestPlatform {
    sched: Weak<TestScheduler>,
    ticks: AtomicU64,
    idle_waits: AtomicU64,
    console: Mutex<String>,
    switches: Mutex<Vec<(CpuId, ProcHandle)>>,
    scripts: Mutex<HashMap<ProcHandle, VecDeque<Action>>>,
    default_action: Mutex<Action>,
    on_cpu: Mutex<HashSet<ProcHandle>>,
    charges: Mutex<Vec<bool>>,
    push_hook: Mutex<Option<(usize, PushHook)>>,
}

impl TestPlatform {
    fn new(sched: Weak<TestScheduler>) -> Self {
        Self {
            sched,
            ticks: AtomicU64::new(0),
            idle_waits: AtomicU64::new(0),
            console: Mutex::new(String::new()),
            switches: Mutex::new(Vec::new()),
            scripts: Mutex::new(HashMap::new()),
            default_action: Mutex::new(Action::Yield),
            on_cpu: Mutex::new(HashSet::new()),
            charges: Mutex::new(Vec::new()),
            push_hook: Mutex::new(None),
        }
    }

    /// Queue actions for the next dispatches of `proc`
    pub fn script(&self, proc: ProcHandle, actions: impl IntoIterator<Item = Action>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(proc)
            .or_default()
            .extend(actions);
    }

    /// Action of processes without a script
    pub fn set_default_action(&self, action: Action) {
        *self.default_action.lock().unwrap() = action;
    }

    pub fn set_ticks(&self, ticks: u64) {
        self.ticks.store(ticks, Ordering::SeqCst);
    }

    pub fn advance(&self, ticks: u64) {
        self.ticks.fetch_add(ticks, Ordering::SeqCst);
    }

    pub fn idle_waits(&self) -> u64 {
        self.idle_waits.load(Ordering::SeqCst)
    }

    /// Processes switched to, in order
    pub fn switches(&self) -> Vec<ProcHandle> {
        self.switches.lock().unwrap().iter().map(|&(_, proc)| proc).collect()
    }

    /// Answers of `charge_tick` during burns, in order
    pub fn charges(&self) -> Vec<bool> {
        self.charges.lock().unwrap().clone()
    }

    pub fn take_console(&self) -> String {
        std::mem::take(&mut *self.console.lock().unwrap())
    }

    /// Run `hook` right before the `nth` next `push_off`, i.e. before the
    /// lock that push guards is taken.
    pub fn before_push_off(&self, nth: usize, hook: impl FnOnce(&TestScheduler) + Send + 'static) {
        *self.push_hook.lock().unwrap() = Some((nth, Box::new(hook)));
    }

    fn run_push_hook(&self) {
        let mut slot = self.push_hook.lock().unwrap();
        let due = match slot.take() {
            Some((remaining, hook)) if remaining > 1 => {
                *slot = Some((remaining - 1, hook));
                None
            }
            other => other.map(|(_, hook)| hook),
        };
        drop(slot);

        if let (Some(hook), Some(sched)) = (due, self.sched.upgrade()) {
            hook(&sched);
        }
    }

    fn next_action(&self, proc: ProcHandle) -> Action {
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&proc)
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or(*self.default_action.lock().unwrap())
    }

    fn play(&self, sched: &TestScheduler, cpu: CpuId, action: Action) {
        match action {
            Action::Yield => sched.yield_now(cpu),
            Action::Burn(ticks) => {
                for _ in 0..ticks {
                    self.advance(1);
                    let should_yield = sched.charge_tick(cpu);
                    self.charges.lock().unwrap().push(should_yield);
                }
                sched.yield_now(cpu);
            }
            Action::Sleep(chan) => {
                let cond = IrqMutex::new(());
                let guard = cond.lock(sched.platform());
                let guard = sched.sleep(cpu, chan, &cond, guard);
                drop(guard);
            }
            Action::Exit(status) => sched.exit(cpu, status),
        }
    }
}

impl InterruptControl for TestPlatform {
    fn push_off(&self) {
        self.run_push_hook();
        let was_enabled = ENABLED.with(|e| e.replace(false));
        DEPTH.with(|depth| {
            if depth.get() == 0 {
                SAVED.with(|saved| saved.set(was_enabled));
            }
            depth.set(depth.get() + 1);
        });
    }

    fn pop_off(&self) {
        if !std::thread::panicking() {
            assert!(!ENABLED.with(Cell::get), "pop_off: interruptible");
        }
        DEPTH.with(|depth| {
            assert!(depth.get() > 0, "pop_off: unbalanced");
            depth.set(depth.get() - 1);
            if depth.get() == 0 && SAVED.with(Cell::get) {
                ENABLED.with(|e| e.set(true));
            }
        });
    }

    fn irq_depth(&self) -> usize {
        DEPTH.with(Cell::get)
    }

    fn interrupts_enabled(&self) -> bool {
        ENABLED.with(Cell::get)
    }
}

impl Platform for TestPlatform {
    fn enable_interrupts(&self) {
        ENABLED.with(|e| e.set(true));
    }

    fn wait_for_interrupt(&self) {
        self.idle_waits.fetch_add(1, Ordering::SeqCst);
        self.advance(1);
    }

    fn switch_to(&self, cpu: CpuId, proc: ProcHandle, guard: ProcGuard<'_>) {
        assert_eq!(guard.state, ProcState::Running);
        assert!(
            self.on_cpu.lock().unwrap().insert(proc),
            "{} dispatched on two CPUs",
            proc
        );
        self.switches.lock().unwrap().push((cpu, proc));

        // The held lock travels with the process.
        std::mem::forget(guard);

        let Some(sched) = self.sched.upgrade() else {
            return;
        };
        let slot = sched.procs().get(proc);

        // SAFETY: the dispatcher's guard was forgotten above; the process side
        // releases that lock on entry, as a first-run trampoline would.
        unsafe { slot.force_unlock(self) };

        let action = self.next_action(proc);
        self.play(&sched, cpu, action);

        // The process already dropped the guard it kept across
        // `switch_to_scheduler`; take the lock again so the dispatcher finds
        // it held, as after a real switch.
        std::mem::forget(slot.lock(self));
    }

    fn switch_to_scheduler(&self, _cpu: CpuId, proc: ProcHandle) {
        self.on_cpu.lock().unwrap().remove(&proc);
    }

    fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    fn console_write(&self, s: &str) {
        self.console.lock().unwrap().push_str(s);
    }
}

/// Build a scheduler over a fresh simulated platform
pub fn boot(config: SchedConfig) -> Arc<TestScheduler> {
    Arc::new_cyclic(|weak| {
        Scheduler::new(config, TestPlatform::new(weak.clone())).expect("valid configuration")
    })
}

/// Platform not attached to any scheduler; processes never run on it
pub fn detached_platform() -> TestPlatform {
    TestPlatform::new(Weak::new())
}

/// Run `rounds` dispatch rounds on `cpu`
pub fn dispatch(sched: &TestScheduler, cpu: CpuId, rounds: usize) -> Vec<Dispatch> {
    (0..rounds).map(|_| sched.dispatch_once(cpu)).collect()
}

/// Members of one queue, head first
pub fn members(sched: &TestScheduler, level: usize, set: QueueSet) -> Vec<ProcHandle> {
    sched.with_queues(|queues| queues.members(level, set).collect())
}

pub fn location(sched: &TestScheduler, proc: ProcHandle) -> Option<(usize, QueueSet)> {
    sched.with_queues(|queues| queues.location(proc))
}

pub fn assert_queues_consistent(sched: &TestScheduler) {
    sched.with_queues(|queues| queues.check_invariants()).expect("queue invariants");
}
