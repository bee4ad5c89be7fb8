//! End-to-end contention scenarios on the lab executor.
//!
//! Each test spawns real tasks that contend on a primitive, sleeps inside
//! the critical section via the timer driver, and checks the observable
//! schedule: grant order, mutual exclusion, concurrency bounds, and the
//! reader/writer fairness rules.

use coopsync::lab::LabExecutor;
use coopsync::sync::{FifoLock, PollingLock, RwLock, Semaphore};
use coopsync::time::sleep;
use coopsync::{assert_with_log, test_complete, test_phase};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

mod common {
    pub fn init_test(name: &str) {
        coopsync::test_utils::init_test_logging();
        coopsync::test_phase!(name);
    }
}

#[test]
fn fifo_lock_grants_in_arrival_order_without_overlap() {
    common::init_test("fifo_lock_grants_in_arrival_order_without_overlap");
    let lock = Rc::new(FifoLock::new());
    let grants = Rc::new(RefCell::new(Vec::new()));
    let inside = Rc::new(RefCell::new(false));

    let mut lab = LabExecutor::new();
    for id in 1..=5u64 {
        let lock = Rc::clone(&lock);
        let grants = Rc::clone(&grants);
        let inside = Rc::clone(&inside);
        lab.spawn(async move {
            let _guard = lock.acquire().await;
            {
                let mut flag = inside.borrow_mut();
                assert!(!*flag, "two tasks inside the critical section");
                *flag = true;
            }
            grants.borrow_mut().push(id);
            sleep(Duration::from_millis(2)).await;
            *inside.borrow_mut() = false;
        });
    }
    lab.run();

    test_phase!("verify grant order");
    let order = grants.borrow().clone();
    assert_with_log!(
        order == vec![1, 2, 3, 4, 5],
        "strict arrival order",
        vec![1u64, 2, 3, 4, 5],
        order
    );
    assert_with_log!(!lock.is_held(), "released at the end", false, lock.is_held());
    test_complete!("fifo_lock_grants_in_arrival_order_without_overlap");
}

#[test]
fn fifo_handoff_is_immune_to_try_acquire_steals() {
    common::init_test("fifo_handoff_is_immune_to_try_acquire_steals");
    let lock = Rc::new(FifoLock::new());
    let grants = Rc::new(RefCell::new(Vec::new()));

    let mut lab = LabExecutor::new();
    for id in 1..=3u64 {
        let lock = Rc::clone(&lock);
        let grants = Rc::clone(&grants);
        lab.spawn(async move {
            let _guard = lock.acquire().await;
            grants.borrow_mut().push(id);
            sleep(Duration::from_millis(2)).await;
        });
    }
    // An interloper polls try_acquire on every pass and must never win
    // while waiters are queued.
    let steal_lock = Rc::clone(&lock);
    let steals = Rc::new(RefCell::new(0usize));
    let steal_count = Rc::clone(&steals);
    lab.spawn(async move {
        for _ in 0..20 {
            let contended = steal_lock.waiters() > 0 || steal_lock.is_held();
            if contended && steal_lock.try_acquire().is_some() {
                *steal_count.borrow_mut() += 1;
            }
            sleep(Duration::from_millis(1)).await;
        }
    });
    lab.run();

    assert_with_log!(*steals.borrow() == 0, "no steals", 0usize, *steals.borrow());
    let order = grants.borrow().clone();
    assert_with_log!(
        order == vec![1, 2, 3],
        "handoff preserved order",
        vec![1u64, 2, 3],
        order
    );
    test_complete!("fifo_handoff_is_immune_to_try_acquire_steals");
}

#[test]
fn semaphore_caps_concurrency_under_load() {
    common::init_test("semaphore_caps_concurrency_under_load");
    let sem = Rc::new(Semaphore::new(3).expect("positive permits"));
    let active = Rc::new(RefCell::new(0usize));
    let peak = Rc::new(RefCell::new(0usize));
    let completed = Rc::new(RefCell::new(0usize));

    let mut lab = LabExecutor::new();
    for _ in 0..10 {
        let sem = Rc::clone(&sem);
        let active = Rc::clone(&active);
        let peak = Rc::clone(&peak);
        let completed = Rc::clone(&completed);
        lab.spawn(async move {
            let _permit = sem.acquire().await;
            {
                let mut a = active.borrow_mut();
                *a += 1;
                let mut p = peak.borrow_mut();
                *p = (*p).max(*a);
            }
            sleep(Duration::from_millis(2)).await;
            *active.borrow_mut() -= 1;
            *completed.borrow_mut() += 1;
        });
    }
    lab.run();

    test_phase!("verify concurrency bound");
    let peak = *peak.borrow();
    assert_with_log!(peak <= 3, "at most three holders", true, peak <= 3);
    assert_with_log!(peak == 3, "bound actually reached", 3usize, peak);
    assert_with_log!(
        *completed.borrow() == 10,
        "all tasks completed",
        10usize,
        *completed.borrow()
    );
    assert_with_log!(
        sem.available_permits() == 3,
        "permits restored",
        3usize,
        sem.available_permits()
    );
    test_complete!("semaphore_caps_concurrency_under_load");
}

#[test]
fn rwlock_writer_preference_end_to_end() {
    common::init_test("rwlock_writer_preference_end_to_end");
    let lock = Rc::new(RwLock::new());
    let events = Rc::new(RefCell::new(Vec::new()));

    let mut lab = LabExecutor::new();

    // First reader gets in immediately and holds for a while.
    let l = Rc::clone(&lock);
    let ev = Rc::clone(&events);
    lab.spawn(async move {
        let _guard = l.read().await;
        ev.borrow_mut().push("reader-1");
        sleep(Duration::from_millis(5)).await;
    });

    // Writer arrives second and must wait out reader-1.
    let l = Rc::clone(&lock);
    let ev = Rc::clone(&events);
    lab.spawn(async move {
        let _guard = l.write().await;
        ev.borrow_mut().push("writer");
        sleep(Duration::from_millis(2)).await;
    });

    // Reader-2 arrives last; the queued writer blocks it even though the
    // lock is only read-held at that point.
    let l = Rc::clone(&lock);
    let ev = Rc::clone(&events);
    lab.spawn(async move {
        let _guard = l.read().await;
        ev.borrow_mut().push("reader-2");
    });

    lab.run();

    let order = events.borrow().clone();
    assert_with_log!(
        order == vec!["reader-1", "writer", "reader-2"],
        "writer admitted before the late reader",
        vec!["reader-1", "writer", "reader-2"],
        order
    );
    test_complete!("rwlock_writer_preference_end_to_end");
}

#[test]
fn rwlock_batch_wakes_queued_readers_together() {
    common::init_test("rwlock_batch_wakes_queued_readers_together");
    let lock = Rc::new(RwLock::new());
    let peak = Rc::new(RefCell::new(0usize));

    let mut lab = LabExecutor::new();

    let l = Rc::clone(&lock);
    lab.spawn(async move {
        let _guard = l.write().await;
        sleep(Duration::from_millis(3)).await;
    });

    for _ in 0..4 {
        let l = Rc::clone(&lock);
        let peak = Rc::clone(&peak);
        lab.spawn(async move {
            let _guard = l.read().await;
            {
                let mut p = peak.borrow_mut();
                *p = (*p).max(l.readers());
            }
            sleep(Duration::from_millis(3)).await;
        });
    }
    lab.run();

    // All four readers were released by one write release and overlapped.
    let peak = *peak.borrow();
    assert_with_log!(peak == 4, "readers admitted together", 4usize, peak);
    test_complete!("rwlock_batch_wakes_queued_readers_together");
}

#[test]
fn polling_lock_serializes_critical_sections() {
    common::init_test("polling_lock_serializes_critical_sections");
    let lock = Rc::new(PollingLock::new(Duration::from_millis(1)));
    let inside = Rc::new(RefCell::new(false));
    let entries = Rc::new(RefCell::new(0usize));

    let mut lab = LabExecutor::new();
    for id in 1..=4u64 {
        let lock = Rc::clone(&lock);
        let inside = Rc::clone(&inside);
        let entries = Rc::clone(&entries);
        lab.spawn(async move {
            lock.acquire(id).await;
            {
                let mut flag = inside.borrow_mut();
                assert!(!*flag, "two tasks inside the critical section");
                *flag = true;
            }
            *entries.borrow_mut() += 1;
            sleep(Duration::from_millis(2)).await;
            *inside.borrow_mut() = false;
            lock.release(id);
        });
    }
    lab.run();

    assert_with_log!(
        *entries.borrow() == 4,
        "every task entered once",
        4usize,
        *entries.borrow()
    );
    assert_with_log!(!lock.is_held(), "released at the end", false, lock.is_held());
    test_complete!("polling_lock_serializes_critical_sections");
}
