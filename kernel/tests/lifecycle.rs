// tests/lifecycle.rs
// Cycle de vie : création, mort, kill, récolte, modes RR et FIFO

mod common;

use common::{
    assert_queues_consistent, boot, detached_platform, dispatch, location, members, Action, TestScheduler,
};
use mqss_kernel::arch::{InterruptControl, Platform};
use mqss_kernel::scheduler::{
    Dispatch, ProcState, QueueSet, SchedConfig, Scheduler, SchedulerError, SchedulingPolicy,
};
use mqss_kernel::sync::IrqMutex;

#[test]
fn test_fork_enqueues_at_starting_level() {
    let sched = boot(SchedConfig::mqss().with_starting_level(2));
    let p = sched.fork("init", None).unwrap();

    assert_eq!(sched.state(p), ProcState::Runnable);
    assert_eq!(sched.pid(p), 1);
    assert_eq!(sched.quantum(p), 4);
    assert_eq!(location(&sched, p), Some((2, QueueSet::Active)));
    assert_eq!(sched.with_queues(|q| q.links(p).original_level), 2);
    assert_eq!(sched.find(1), Some(p));
    assert_eq!(sched.find(9), None);
}

#[test]
fn test_create_leaves_process_unqueued() {
    let sched = boot(SchedConfig::mqss());
    let p = sched.create("child", Some(1), Some(1)).unwrap();

    assert_eq!(sched.state(p), ProcState::Used);
    assert_eq!(location(&sched, p), None);
    assert_eq!(sched.with_process(p, |p| p.parent), Some(1));

    sched.activate(p);
    assert_eq!(location(&sched, p), Some((1, QueueSet::Active)));
    assert_eq!(sched.stats().snapshot().forks, 1);
}

#[test]
fn test_priofork_rejects_out_of_range_level() {
    let sched = boot(SchedConfig::mqss());

    let err = sched.priofork("bad", 3, None).unwrap_err();
    assert_eq!(err, SchedulerError::InvalidPriority { value: 3, levels: 3 });
    assert!(err.is_recoverable());
    assert!(sched.procs().iter().all(|slot| !slot.is_locked()));
}

#[test]
fn test_full_table_is_reported() {
    let sched = boot(SchedConfig::mqss().with_capacity(2, 1));
    sched.fork("a", None).unwrap();
    sched.fork("b", None).unwrap();

    assert_eq!(
        sched.fork("c", None).unwrap_err(),
        SchedulerError::ProcessTableFull { max: 2 }
    );
}

#[test]
fn test_exit_dequeues_before_zombie() {
    let sched = boot(SchedConfig::mqss());
    let p = sched.fork("p", None).unwrap();
    let q = sched.fork("q", None).unwrap();
    sched.platform().script(p, [Action::Exit(7)]);

    assert_eq!(sched.dispatch_once(0), Dispatch::Ran(p));

    assert_eq!(sched.state(p), ProcState::Zombie);
    assert_eq!(location(&sched, p), None);
    assert_eq!(members(&sched, 0, QueueSet::Active), [q]);
    assert_eq!(sched.stats().snapshot().exits, 1);

    assert_eq!(sched.reap(p), Ok((1, 7)));
    assert_eq!(sched.state(p), ProcState::Unused);
    assert_queues_consistent(&sched);
}

#[test]
fn test_reap_requires_zombie() {
    let sched = boot(SchedConfig::mqss());
    let p = sched.fork("p", None).unwrap();

    assert_eq!(sched.reap(p), Err(SchedulerError::NotZombie { pid: 1 }));
}

#[test]
fn test_reaped_slot_is_reused() {
    let sched = boot(SchedConfig::mqss().with_capacity(1, 1));
    let p = sched.fork("first", None).unwrap();
    sched.platform().script(p, [Action::Exit(0)]);
    sched.dispatch_once(0);
    sched.reap(p).unwrap();

    let again = sched.priofork("second", 1, None).unwrap();
    assert_eq!(again, p);
    assert_eq!(sched.pid(again), 2);
    assert_eq!(location(&sched, again), Some((1, QueueSet::Active)));
}

#[test]
fn test_kill_wakes_sleeper() {
    let sched = boot(SchedConfig::mqss());
    let p = sched.fork("victim", None).unwrap();
    sched.with_process(p, |p| p.quantum = 2);
    sched.platform().script(p, [Action::Sleep(11)]);
    sched.dispatch_once(0);

    assert_eq!(sched.kill(1), Ok(()));

    assert!(sched.killed(p));
    assert_eq!(sched.state(p), ProcState::Runnable);
    assert_eq!(sched.quantum(p), 2);
    assert_eq!(location(&sched, p), Some((0, QueueSet::Active)));
    assert_eq!(sched.wakeup(11), 0);
}

#[test]
fn test_kill_runnable_only_sets_flag() {
    let sched = boot(SchedConfig::mqss());
    let p = sched.fork("p", None).unwrap();

    sched.kill(1).unwrap();
    assert!(sched.killed(p));
    assert_eq!(sched.state(p), ProcState::Runnable);
    assert_eq!(sched.stats().snapshot().wakeups, 0);

    assert_eq!(sched.kill(42), Err(SchedulerError::NoSuchProcess { pid: 42 }));
}

#[test]
fn test_set_killed_is_sticky() {
    let sched = boot(SchedConfig::mqss());
    let p = sched.fork("p", None).unwrap();
    assert!(!sched.killed(p));

    sched.set_killed(p);
    sched.dispatch_once(0);
    assert!(sched.killed(p));
}

/// Put a one-slot scheduler's only process to sleep on channel 5, then let
/// `wake` wake it while CPU 1 runs it to completion in between the wakeup
/// and the relink.
fn exit_during_wakeup(wake: impl FnOnce(&TestScheduler)) {
    let sched = boot(SchedConfig::mqss().with_capacity(1, 2));
    let p = sched.fork("sleeper", None).unwrap();
    sched.platform().script(p, [Action::Sleep(5), Action::Exit(0)]);
    sched.dispatch_once(0);
    assert_eq!(sched.state(p), ProcState::Sleeping);

    // First push: the process lock. Second push: the queue lock of the relink.
    sched.platform().before_push_off(2, move |sched| {
        assert_eq!(sched.dispatch_once(1), Dispatch::Ran(p));
    });
    wake(sched.as_ref());

    assert_eq!(sched.state(p), ProcState::Zombie);
    assert_eq!(location(&sched, p), None);
    assert_queues_consistent(&sched);

    assert_eq!(sched.reap(p), Ok((1, 0)));
    let again = sched.fork("again", None).unwrap();
    assert_eq!(again, p);
    assert_eq!(location(&sched, again), Some((0, QueueSet::Active)));
    assert_queues_consistent(&sched);
}

#[test]
fn test_wakeup_does_not_requeue_exited_process() {
    exit_during_wakeup(|sched| assert_eq!(sched.wakeup(5), 1));
}

#[test]
fn test_kill_does_not_requeue_exited_process() {
    exit_during_wakeup(|sched| assert_eq!(sched.kill(1), Ok(())));
}

#[test]
fn test_dispatch_releases_process_lock() {
    let sched = boot(SchedConfig::mqss());
    let a = sched.fork("a", None).unwrap();
    let b = sched.fork("b", None).unwrap();
    let c = sched.fork("c", None).unwrap();
    sched.platform().script(a, [Action::Yield]);
    sched.platform().script(b, [Action::Sleep(3)]);
    sched.platform().script(c, [Action::Exit(0)]);

    for _ in 0..3 {
        assert!(matches!(sched.dispatch_once(0), Dispatch::Ran(_)));
        assert!(sched.procs().iter().all(|slot| !slot.is_locked()));
        assert_eq!(sched.platform().irq_depth(), 0);
        assert_eq!(sched.current(0), None);
    }

    // A process that switched away is still pickable on the next round.
    assert_eq!(sched.dispatch_once(0), Dispatch::Ran(a));
}

#[test]
fn test_fifo_quantum_saturates() {
    let sched = boot(SchedConfig::fifo());
    let p = sched.fork("p", None).unwrap();
    sched.with_process(p, |p| p.quantum = i32::MIN + 1);
    sched.platform().script(p, [Action::Burn(3)]);

    sched.dispatch_once(0);

    assert_eq!(sched.quantum(p), i32::MIN);
    assert_eq!(sched.platform().charges(), [true; 3]);
}

#[test]
fn test_round_robin_resets_quantum() {
    let sched = boot(SchedConfig::round_robin());
    assert_eq!(sched.policy(), SchedulingPolicy::RoundRobin);
    let a = sched.fork("a", None).unwrap();
    let b = sched.fork("b", None).unwrap();
    sched.platform().set_default_action(Action::Burn(1));

    dispatch(&sched, 0, 4);

    assert_eq!(sched.platform().switches(), [a, b, a, b]);
    assert_eq!(sched.quantum(a), 4);
    assert_eq!(sched.quantum(b), 4);
    assert_eq!(members(&sched, 0, QueueSet::Active), [a, b]);
    assert_eq!(sched.stats().snapshot().swaps, 0);
}

#[test]
fn test_round_robin_wakeup_resets_quantum() {
    let sched = boot(SchedConfig::round_robin());
    let p = sched.fork("p", None).unwrap();
    sched.platform().script(p, [Action::Sleep(2)]);
    sched.dispatch_once(0);
    sched.with_process(p, |p| p.quantum = 1);

    sched.wakeup(2);
    assert_eq!(sched.quantum(p), 4);
    assert_eq!(location(&sched, p), Some((0, QueueSet::Active)));
}

#[test]
fn test_round_robin_charge_tick() {
    let sched = boot(SchedConfig::round_robin().with_quantums(10, 2));
    let p = sched.fork("p", None).unwrap();
    sched.platform().script(p, [Action::Burn(2)]);

    sched.dispatch_once(0);
    assert_eq!(sched.platform().charges(), [false, true]);
}

#[test]
fn test_single_level_mqss_runs_as_round_robin() {
    let sched = boot(SchedConfig::mqss().with_levels(1));
    assert_eq!(sched.policy(), SchedulingPolicy::RoundRobin);
}

#[test]
fn test_fifo_scans_table_round_robin() {
    let sched = boot(SchedConfig::fifo());
    let a = sched.fork("a", None).unwrap();
    let b = sched.fork("b", None).unwrap();
    let c = sched.fork("c", None).unwrap();
    sched.platform().set_default_action(Action::Burn(1));

    dispatch(&sched, 0, 4);

    assert_eq!(sched.platform().switches(), [a, b, c, a]);
    assert_eq!(location(&sched, a), None);
    assert_eq!(sched.platform().charges(), [true; 4]);
    // No quantum enforcement: the counter just runs down.
    assert_eq!(sched.quantum(a), 2);
}

#[test]
fn test_fifo_exit_and_sleep_skip_slots() {
    let sched = boot(SchedConfig::fifo());
    let a = sched.fork("a", None).unwrap();
    let b = sched.fork("b", None).unwrap();
    sched.platform().script(a, [Action::Sleep(1)]);
    sched.platform().script(b, [Action::Exit(3)]);

    assert_eq!(dispatch(&sched, 0, 3), [Dispatch::Ran(a), Dispatch::Ran(b), Dispatch::Idle]);
    sched.wakeup(1);
    assert_eq!(sched.dispatch_once(0), Dispatch::Ran(a));
}

#[test]
fn test_unlinked_process_survives_flag_flip() {
    let sched = boot(SchedConfig::mqss().with_levels(2));
    let waiting = sched.create("waiting", None, None).unwrap();
    let runner = sched.fork("runner", None).unwrap();
    sched.with_queues(|q| q.enqueue(runner, 0, QueueSet::Expired));

    // Swap while `waiting` is live but not linked anywhere.
    sched.dispatch_once(0);
    assert_eq!(sched.stats().snapshot().swaps, 1);
    assert!(sched.with_queues(|q| q.links(waiting).in_expired_set));

    sched.activate(waiting);
    assert_eq!(location(&sched, waiting), Some((0, QueueSet::Active)));
    assert_eq!(members(&sched, 0, QueueSet::Active), [runner, waiting]);
    assert_queues_consistent(&sched);
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = SchedConfig::mqss().with_starting_level(5);
    let result = Scheduler::new(config, detached_platform());

    assert!(matches!(result, Err(SchedulerError::InvalidConfig { .. })));
}

#[test]
#[should_panic(expected = "yield: no current process on cpu 0")]
fn test_yield_without_current_is_fatal() {
    let sched = boot(SchedConfig::mqss());
    sched.yield_now(0);
}

#[test]
#[should_panic(expected = "suspend: pid 1 still running")]
fn test_suspend_while_running_is_fatal() {
    let sched = boot(SchedConfig::mqss());
    let p = sched.fork("p", None).unwrap();

    let mut guard = sched.procs().get(p).lock(sched.platform());
    guard.set_state(ProcState::Running);
    sched.suspend(0, p, guard);
}

#[test]
#[should_panic(expected = "suspend: 2 locks held")]
fn test_suspend_with_extra_lock_is_fatal() {
    let sched = boot(SchedConfig::mqss());
    let p = sched.fork("p", None).unwrap();

    let cond = IrqMutex::new(());
    let _cond = cond.lock(sched.platform());
    let guard = sched.procs().get(p).lock(sched.platform());
    sched.suspend(0, p, guard);
}

#[test]
#[should_panic(expected = "suspend: interrupts enabled")]
fn test_suspend_with_interrupts_enabled_is_fatal() {
    let sched = boot(SchedConfig::mqss());
    let p = sched.fork("p", None).unwrap();

    let guard = sched.procs().get(p).lock(sched.platform());
    sched.platform().enable_interrupts();
    sched.suspend(0, p, guard);
}

#[test]
#[should_panic(expected = "activate")]
fn test_double_activate_is_fatal() {
    let sched = boot(SchedConfig::mqss());
    let p = sched.fork("p", None).unwrap();
    sched.activate(p);
}
