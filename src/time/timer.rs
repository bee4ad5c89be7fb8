//! Timer heap and background driver thread.
//!
//! A small min-heap of `(deadline, waker)` pairs ordered by deadline with a
//! generation tiebreak, serviced by a single lazily spawned driver thread
//! that sleeps until the earliest deadline and wakes expired entries.

use parking_lot::{Condvar, Mutex};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, OnceLock};
use std::task::Waker;
use std::time::Instant;

#[derive(Debug)]
struct TimerEntry {
    deadline: Instant,
    generation: u64,
    waker: Waker,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.generation == other.generation
    }
}

impl Eq for TimerEntry {}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (earliest deadline first).
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A min-heap of timers ordered by deadline.
#[derive(Debug, Default)]
struct TimerHeap {
    heap: BinaryHeap<TimerEntry>,
    next_generation: u64,
}

impl TimerHeap {
    fn insert(&mut self, deadline: Instant, waker: Waker) {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.heap.push(TimerEntry {
            deadline,
            generation,
            waker,
        });
    }

    fn peek_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|e| e.deadline)
    }

    /// Pops all wakers whose deadline is `<= now`.
    fn pop_expired(&mut self, now: Instant) -> SmallVec<[Waker; 4]> {
        let mut expired = SmallVec::new();
        while let Some(entry) = self.heap.peek() {
            if entry.deadline > now {
                break;
            }
            if let Some(entry) = self.heap.pop() {
                expired.push(entry.waker);
            }
        }
        expired
    }
}

/// Shared timer driver: one heap, one worker thread, process-wide.
#[derive(Debug)]
pub(crate) struct TimerDriver {
    state: Mutex<TimerHeap>,
    cv: Condvar,
}

impl TimerDriver {
    pub(crate) fn global() -> &'static Arc<TimerDriver> {
        static DRIVER: OnceLock<Arc<TimerDriver>> = OnceLock::new();
        DRIVER.get_or_init(|| {
            let driver = Arc::new(TimerDriver {
                state: Mutex::new(TimerHeap::default()),
                cv: Condvar::new(),
            });
            let worker = Arc::clone(&driver);
            std::thread::Builder::new()
                .name("coopsync-timer".into())
                .spawn(move || worker.run())
                .expect("failed to spawn timer driver thread");
            driver
        })
    }

    /// Registers a waker to be invoked once `deadline` has passed.
    pub(crate) fn register(&self, deadline: Instant, waker: Waker) {
        let mut heap = self.state.lock();
        heap.insert(deadline, waker);
        drop(heap);
        self.cv.notify_one();
    }

    fn run(&self) {
        let mut heap = self.state.lock();
        loop {
            let expired = heap.pop_expired(Instant::now());
            if !expired.is_empty() {
                // Wake outside the lock.
                drop(heap);
                for waker in expired {
                    waker.wake();
                }
                heap = self.state.lock();
                continue;
            }
            match heap.peek_deadline() {
                Some(deadline) => {
                    let _ = self.cv.wait_until(&mut heap, deadline);
                }
                None => self.cv.wait(&mut heap),
            }
        }
    }
}
