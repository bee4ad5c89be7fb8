//! Counting semaphore for bounded concurrency.
//!
//! A semaphore admits up to `max_permits` simultaneous holders. Each
//! successful acquisition takes exactly one permit and returns a
//! [`SemaphorePermit`] that gives it back on drop. Waiters are admitted in
//! strict FIFO order: only the queue head may take a permit, so permits
//! freed while earlier waiters are queued cannot be claimed by later
//! arrivals.
//!
//! # Invariant
//!
//! `0 <= permits <= max_permits` across every transition.

use parking_lot::Mutex as ParkingMutex;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll, Waker};

use crate::error::InvalidConfiguration;

/// A counting semaphore for limiting concurrent access.
#[derive(Debug)]
pub struct Semaphore {
    /// Internal state for permits and waiters.
    state: ParkingMutex<SemaphoreState>,
    /// Lock-free shadow of available permits for read-heavy diagnostics.
    permits_shadow: AtomicUsize,
    /// Maximum permits (initial count).
    max_permits: usize,
}

#[derive(Debug)]
struct SemaphoreState {
    /// Number of available permits.
    permits: usize,
    /// Queue of waiters.
    waiters: VecDeque<Waiter>,
    /// Next waiter id for de-duplication.
    next_waiter_id: u64,
}

#[derive(Debug)]
struct Waiter {
    id: u64,
    waker: Waker,
}

fn front_waiter_waker(state: &SemaphoreState) -> Option<Waker> {
    state.waiters.front().map(|waiter| waiter.waker.clone())
}

fn remove_waiter_and_take_next_waker(state: &mut SemaphoreState, waiter_id: u64) -> Option<Waker> {
    if state
        .waiters
        .front()
        .is_some_and(|waiter| waiter.id == waiter_id)
    {
        // O(1) removal: the waiter is at the front of the FIFO queue.
        state.waiters.pop_front();
        front_waiter_waker(state)
    } else {
        if let Some(pos) = state.waiters.iter().position(|w| w.id == waiter_id) {
            state.waiters.remove(pos);
        }
        None
    }
}

impl Semaphore {
    /// Creates a new semaphore with the given number of permits.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConfiguration::ZeroPermits`] if `max_permits` is not
    /// a positive integer.
    pub fn new(max_permits: usize) -> Result<Self, InvalidConfiguration> {
        if max_permits == 0 {
            return Err(InvalidConfiguration::ZeroPermits);
        }
        Ok(Self {
            state: ParkingMutex::new(SemaphoreState {
                permits: max_permits,
                waiters: VecDeque::with_capacity(4),
                next_waiter_id: 0,
            }),
            permits_shadow: AtomicUsize::new(max_permits),
            max_permits,
        })
    }

    /// Returns the number of currently available permits.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        // Relaxed: advisory hint only; the real count is lock-protected.
        self.permits_shadow.load(Ordering::Relaxed)
    }

    /// Returns the maximum number of permits (initial count).
    #[must_use]
    pub fn max_permits(&self) -> usize {
        self.max_permits
    }

    /// Returns the number of tasks currently waiting for a permit.
    #[must_use]
    pub fn waiters(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Acquires one permit asynchronously, queuing behind earlier callers.
    pub fn acquire(&self) -> SemaphoreAcquire<'_> {
        SemaphoreAcquire {
            semaphore: self,
            waiter_id: None,
        }
    }

    /// Tries to acquire one permit without waiting.
    ///
    /// Fails when no permit is available or when any waiter is queued
    /// (strict FIFO admission).
    pub fn try_acquire(&self) -> Option<SemaphorePermit<'_>> {
        let mut state = self.state.lock();
        if !state.waiters.is_empty() || state.permits == 0 {
            return None;
        }
        state.permits -= 1;
        self.permits_shadow.store(state.permits, Ordering::Relaxed);
        drop(state);
        Some(SemaphorePermit { semaphore: self })
    }

    /// Returns one permit and wakes the queue head, if any.
    fn add_permit(&self) {
        let waker = {
            let mut state = self.state.lock();
            debug_assert!(
                state.permits < self.max_permits,
                "permit released more times than acquired"
            );
            state.permits = (state.permits + 1).min(self.max_permits);
            self.permits_shadow.store(state.permits, Ordering::Relaxed);
            // Only the front waiter can make progress under FIFO admission.
            front_waiter_waker(&state)
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// Future returned by [`Semaphore::acquire`].
#[derive(Debug)]
pub struct SemaphoreAcquire<'a> {
    semaphore: &'a Semaphore,
    waiter_id: Option<u64>,
}

impl<'a> Future for SemaphoreAcquire<'a> {
    type Output = SemaphorePermit<'a>;

    fn poll(mut self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.semaphore.state.lock();

        let waiter_id = if let Some(id) = self.waiter_id {
            id
        } else {
            let id = state.next_waiter_id;
            state.next_waiter_id = state.next_waiter_id.wrapping_add(1);
            self.waiter_id = Some(id);
            id
        };

        // FIFO fairness: only acquire if the queue is empty or we are at
        // the front. This prevents queue jumping where a new arrival grabs
        // a permit before earlier-waiting tasks get their turn.
        let is_next_in_line = state.waiters.front().is_none_or(|w| w.id == waiter_id);

        if is_next_in_line && state.permits > 0 {
            state.permits -= 1;
            self.semaphore
                .permits_shadow
                .store(state.permits, Ordering::Relaxed);

            if !state.waiters.is_empty() {
                state.waiters.pop_front();
            }

            // Wake the next waiter if permits remain, otherwise a release
            // that freed several permits would admit only one waiter.
            let next_waker = if state.permits > 0 {
                front_waiter_waker(&state)
            } else {
                None
            };
            drop(state);
            self.waiter_id = None;
            if let Some(next) = next_waker {
                next.wake();
            }
            return Poll::Ready(SemaphorePermit {
                semaphore: self.semaphore,
            });
        }

        if let Some(existing) = state
            .waiters
            .iter_mut()
            .find(|waiter| waiter.id == waiter_id)
        {
            if !existing.waker.will_wake(context.waker()) {
                existing.waker.clone_from(context.waker());
            }
        } else {
            state.waiters.push_back(Waiter {
                id: waiter_id,
                waker: context.waker().clone(),
            });
        }
        Poll::Pending
    }
}

impl Drop for SemaphoreAcquire<'_> {
    fn drop(&mut self) {
        if let Some(waiter_id) = self.waiter_id {
            let next_waker = {
                let mut state = self.semaphore.state.lock();
                // If we were at the front, wake the next waiter when we
                // leave, otherwise the permit-available signal is lost.
                let waker = remove_waiter_and_take_next_waker(&mut state, waiter_id);
                if state.permits > 0 { waker } else { None }
            };
            if let Some(next) = next_waker {
                next.wake();
            }
        }
    }
}

/// Release capability for [`Semaphore`]: returns its permit when dropped.
#[must_use = "permit will be immediately released if not held"]
#[derive(Debug)]
pub struct SemaphorePermit<'a> {
    semaphore: &'a Semaphore,
}

impl Drop for SemaphorePermit<'_> {
    fn drop(&mut self) {
        self.semaphore.add_permit();
    }
}
