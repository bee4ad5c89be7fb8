//! One-shot delay future.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use super::timer::TimerDriver;

/// Returns a future that completes once `duration` has elapsed.
///
/// The future carries no cancellation state: dropping it before the deadline
/// simply abandons the registration, and the eventual wake of a stale waker
/// is a benign spurious wakeup.
pub fn sleep(duration: Duration) -> Sleep {
    Sleep {
        deadline: Instant::now() + duration,
        registered: None,
    }
}

/// Future returned by [`sleep`].
#[derive(Debug)]
pub struct Sleep {
    deadline: Instant,
    /// Last waker handed to the timer driver, so re-polls with an unchanged
    /// waker do not pile up duplicate heap entries.
    registered: Option<Waker>,
}

impl Sleep {
    /// Returns the instant at which the future completes.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
        if Instant::now() >= self.deadline {
            return Poll::Ready(());
        }
        let stale = self
            .registered
            .as_ref()
            .is_none_or(|w| !w.will_wake(context.waker()));
        if stale {
            let waker = context.waker().clone();
            TimerDriver::global().register(self.deadline, waker.clone());
            self.registered = Some(waker);
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn poll_once<T, F>(future: &mut F) -> Option<T>
    where
        F: Future<Output = T> + Unpin,
    {
        let waker = Waker::noop();
        let mut cx = Context::from_waker(waker);
        match Pin::new(future).poll(&mut cx) {
            Poll::Ready(v) => Some(v),
            Poll::Pending => None,
        }
    }

    #[derive(Debug, Default)]
    struct CountingWaker(std::sync::atomic::AtomicUsize);

    impl CountingWaker {
        fn count(&self) -> usize {
            self.0.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    impl std::task::Wake for CountingWaker {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[test]
    fn zero_duration_completes_immediately() {
        let mut fut = sleep(Duration::ZERO);
        assert!(poll_once(&mut fut).is_some());
    }

    #[test]
    fn pending_until_deadline_then_woken() {
        let counting = Arc::new(CountingWaker::default());
        let waker = Waker::from(Arc::clone(&counting));
        let mut cx = Context::from_waker(&waker);

        let mut fut = sleep(Duration::from_millis(10));
        assert!(Pin::new(&mut fut).poll(&mut cx).is_pending());

        let start = Instant::now();
        while counting.count() == 0 && start.elapsed() < Duration::from_secs(2) {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(counting.count() >= 1);
        assert!(poll_once(&mut fut).is_some());
    }

    #[test]
    fn repoll_with_same_waker_does_not_reregister() {
        let counting = Arc::new(CountingWaker::default());
        let waker = Waker::from(Arc::clone(&counting));
        let mut cx = Context::from_waker(&waker);

        let mut fut = sleep(Duration::from_millis(20));
        assert!(Pin::new(&mut fut).poll(&mut cx).is_pending());
        assert!(Pin::new(&mut fut).poll(&mut cx).is_pending());

        let start = Instant::now();
        while counting.count() == 0 && start.elapsed() < Duration::from_secs(2) {
            std::thread::sleep(Duration::from_millis(1));
        }
        // A single registration means a single wake.
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(counting.count(), 1);
    }
}
