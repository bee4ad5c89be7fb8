//! Single-threaded cooperative executor for tests and demos.
//!
//! `LabExecutor` polls a fixed set of spawned tasks in wake order on the
//! calling thread. Tasks are plain `'static` futures with no `Send` bound,
//! so test code can share state through `Rc<RefCell<..>>` and observe
//! interleavings directly. When every live task is pending the executor
//! parks until an external wake arrives, for example from the timer driver
//! thread behind [`crate::time::sleep`].

use parking_lot::{Condvar, Mutex as ParkingMutex};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

type LocalFuture = Pin<Box<dyn Future<Output = ()> + 'static>>;

#[derive(Debug, Default)]
struct Shared {
    ready: ParkingMutex<VecDeque<usize>>,
    cv: Condvar,
}

impl Shared {
    fn push_ready(&self, index: usize) {
        let mut ready = self.ready.lock();
        if !ready.contains(&index) {
            ready.push_back(index);
        }
        drop(ready);
        self.cv.notify_one();
    }
}

struct TaskWaker {
    index: usize,
    shared: Arc<Shared>,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.shared.push_ready(self.index);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.shared.push_ready(self.index);
    }
}

/// A deterministic single-threaded task executor.
#[derive(Default)]
pub struct LabExecutor {
    tasks: Vec<Option<LocalFuture>>,
    shared: Arc<Shared>,
}

impl LabExecutor {
    /// Creates an executor with no tasks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a task. It is polled for the first time inside [`run`] or
    /// [`run_until_stalled`], in spawn order.
    ///
    /// [`run`]: LabExecutor::run
    /// [`run_until_stalled`]: LabExecutor::run_until_stalled
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + 'static,
    {
        let index = self.tasks.len();
        self.tasks.push(Some(Box::pin(future)));
        self.shared.ready.lock().push_back(index);
    }

    /// Returns the number of tasks that have not yet completed.
    #[must_use]
    pub fn live_tasks(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_some()).count()
    }

    /// Runs until every spawned task completes.
    ///
    /// Parks the calling thread when all live tasks are pending; external
    /// wakes (timer expirations, wakes from other threads) resume it.
    pub fn run(&mut self) {
        while self.live_tasks() > 0 {
            let next = self.shared.ready.lock().pop_front();
            match next {
                Some(index) => self.poll_task(index),
                None => {
                    let mut ready = self.shared.ready.lock();
                    if ready.is_empty() {
                        self.shared.cv.wait(&mut ready);
                    }
                }
            }
        }
    }

    /// Polls every ready task without parking, returning once the ready
    /// queue is drained. Pending tasks are left in place.
    pub fn run_until_stalled(&mut self) {
        loop {
            let next = self.shared.ready.lock().pop_front();
            match next {
                Some(index) => self.poll_task(index),
                None => return,
            }
        }
    }

    fn poll_task(&mut self, index: usize) {
        // Completed tasks can still receive stale wakes.
        let Some(mut task) = self.tasks.get_mut(index).and_then(Option::take) else {
            return;
        };
        let waker = Waker::from(Arc::new(TaskWaker {
            index,
            shared: Arc::clone(&self.shared),
        }));
        let mut cx = Context::from_waker(&waker);
        match task.as_mut().poll(&mut cx) {
            Poll::Ready(()) => {
                tracing::trace!(task = index, "task completed");
            }
            Poll::Pending => {
                self.tasks[index] = Some(task);
            }
        }
    }
}

impl std::fmt::Debug for LabExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabExecutor")
            .field("tasks", &self.tasks.len())
            .field("live", &self.live_tasks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{FifoLock, Semaphore};
    use crate::test_utils::init_test_logging;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn tasks_run_to_completion_in_spawn_order() {
        init_test("tasks_run_to_completion_in_spawn_order");
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut lab = LabExecutor::new();
        for id in 0..3u64 {
            let order = Rc::clone(&order);
            lab.spawn(async move {
                order.borrow_mut().push(id);
            });
        }
        lab.run();
        crate::assert_with_log!(
            *order.borrow() == vec![0, 1, 2],
            "spawn order preserved",
            vec![0u64, 1, 2],
            order.borrow().clone()
        );
        crate::assert_with_log!(lab.live_tasks() == 0, "all done", 0usize, lab.live_tasks());
        crate::test_complete!("tasks_run_to_completion_in_spawn_order");
    }

    #[test]
    fn run_until_stalled_leaves_pending_tasks() {
        init_test("run_until_stalled_leaves_pending_tasks");
        let lock = Rc::new(FifoLock::new());
        let holder = lock.try_acquire().expect("free lock");

        let mut lab = LabExecutor::new();
        let task_lock = Rc::clone(&lock);
        lab.spawn(async move {
            let _guard = task_lock.acquire().await;
        });
        lab.run_until_stalled();
        crate::assert_with_log!(lab.live_tasks() == 1, "blocked", 1usize, lab.live_tasks());

        drop(holder);
        lab.run_until_stalled();
        crate::assert_with_log!(lab.live_tasks() == 0, "unblocked", 0usize, lab.live_tasks());
        crate::test_complete!("run_until_stalled_leaves_pending_tasks");
    }

    #[test]
    fn semaphore_bounds_concurrency_across_tasks() {
        init_test("semaphore_bounds_concurrency_across_tasks");
        let sem = Rc::new(Semaphore::new(2).expect("positive permits"));
        let active = Rc::new(RefCell::new((0usize, 0usize)));

        let mut lab = LabExecutor::new();
        for _ in 0..6 {
            let sem = Rc::clone(&sem);
            let active = Rc::clone(&active);
            lab.spawn(async move {
                let _permit = sem.acquire().await;
                {
                    let mut a = active.borrow_mut();
                    a.0 += 1;
                    a.1 = a.1.max(a.0);
                }
                crate::time::sleep(std::time::Duration::from_millis(2)).await;
                active.borrow_mut().0 -= 1;
            });
        }
        lab.run();

        let peak = active.borrow().1;
        crate::assert_with_log!(peak <= 2, "peak concurrency bounded", true, peak <= 2);
        crate::assert_with_log!(peak >= 1, "work happened", true, peak >= 1);
        crate::test_complete!("semaphore_bounds_concurrency_across_tasks");
    }

    #[test]
    fn stale_wake_of_completed_task_is_ignored() {
        init_test("stale_wake_of_completed_task_is_ignored");
        let mut lab = LabExecutor::new();
        lab.spawn(async {});
        lab.run();

        // A late wake targets slot 0 after it completed.
        lab.shared.push_ready(0);
        lab.run_until_stalled();
        crate::assert_with_log!(lab.live_tasks() == 0, "still done", 0usize, lab.live_tasks());
        crate::test_complete!("stale_wake_of_completed_task_is_ignored");
    }
}
