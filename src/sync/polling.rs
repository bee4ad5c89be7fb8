//! Mutual exclusion via fixed-delay busy-wait retry.
//!
//! `PollingLock` keeps no wait queue: a blocked caller re-tests the held
//! flag after a configured delay, and whichever caller's retry lands first
//! after a release wins. This makes the primitive deliberately unfair — a
//! repeatedly delayed caller can starve — which is its documented contrast
//! with [`FifoLock`](crate::sync::FifoLock).
//!
//! Unlike the queue-based primitives, acquisition does not return a guard:
//! the caller pairs `acquire(id)` with an explicit `release(id)`. Releasing
//! an unheld lock clears an already-clear flag and is a silent no-op.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use crate::time::{sleep, Sleep};

/// A polling mutual-exclusion lock with a fixed retry delay.
#[derive(Debug)]
pub struct PollingLock {
    /// Whether the lock is currently held.
    held: AtomicBool,
    /// Delay between retries while the lock is held by someone else.
    retry_delay: Duration,
}

impl PollingLock {
    /// Creates a new unlocked instance that retries every `retry_delay`.
    ///
    /// A zero delay degenerates into polling on every scheduler pass.
    #[must_use]
    pub fn new(retry_delay: Duration) -> Self {
        Self {
            held: AtomicBool::new(false),
            retry_delay,
        }
    }

    /// Returns true if the lock is currently held.
    #[inline]
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// Returns the configured retry delay.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Acquires the lock, retrying on the configured delay while it is held.
    ///
    /// `caller_id` is used for observability only.
    pub fn acquire(&self, caller_id: u64) -> PollingAcquire<'_> {
        PollingAcquire {
            lock: self,
            caller_id,
            delay: None,
        }
    }

    /// Releases the lock unconditionally.
    ///
    /// Calling this while the lock is not held is a no-op, not an error.
    /// `caller_id` is used for observability only.
    pub fn release(&self, caller_id: u64) {
        self.held.store(false, Ordering::Release);
        tracing::trace!(caller = caller_id, "polling lock released");
    }

    #[inline]
    fn try_claim(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }
}

/// Future returned by [`PollingLock::acquire`].
#[derive(Debug)]
pub struct PollingAcquire<'a> {
    lock: &'a PollingLock,
    caller_id: u64,
    /// Armed while waiting out a retry interval.
    delay: Option<Sleep>,
}

impl Future for PollingAcquire<'_> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
        loop {
            if self.lock.try_claim() {
                tracing::trace!(caller = self.caller_id, "polling lock acquired");
                self.delay = None;
                return Poll::Ready(());
            }

            let retry_delay = self.lock.retry_delay;
            let this = &mut *self;
            let delay = this.delay.get_or_insert_with(|| sleep(retry_delay));
            match Pin::new(delay).poll(context) {
                // Retry interval elapsed: test the flag again immediately.
                Poll::Ready(()) => this.delay = None,
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
