//! Strict first-in-first-out mutual exclusion.
//!
//! Callers that find the lock held are appended to an explicit wait queue
//! and granted the lock in exact `acquire()` call order. Release performs a
//! **direct handoff**: when the queue is non-empty the lock never becomes
//! observably free — ownership transfers to the queue head under the state
//! lock, so no late arrival (including [`FifoLock::try_acquire`]) can jump
//! the queue.

use parking_lot::Mutex as ParkingMutex;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

/// A mutual-exclusion lock with a strict FIFO wait queue.
#[derive(Debug)]
pub struct FifoLock {
    state: ParkingMutex<FifoState>,
}

#[derive(Debug)]
struct FifoState {
    /// Whether the lock is currently held.
    held: bool,
    /// Queue of waiters, granted in arrival order.
    queue: VecDeque<Waiter>,
    /// Monotonic counter for waiter identity.
    next_waiter_id: u64,
}

#[derive(Debug)]
struct Waiter {
    id: u64,
    waker: Waker,
    /// Set by a release handoff; the owning future converts it to a guard
    /// on its next poll.
    granted: bool,
}

impl FifoLock {
    /// Creates a new unlocked instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ParkingMutex::new(FifoState {
                held: false,
                queue: VecDeque::with_capacity(4),
                next_waiter_id: 0,
            }),
        }
    }

    /// Returns true if the lock is currently held.
    #[inline]
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.state.lock().held
    }

    /// Returns the number of tasks currently waiting for the lock.
    #[must_use]
    pub fn waiters(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Acquires the lock asynchronously, queuing behind earlier callers.
    pub fn acquire(&self) -> FifoLockFuture<'_> {
        FifoLockFuture {
            lock: self,
            waiter_id: None,
        }
    }

    /// Tries to acquire the lock without waiting.
    ///
    /// Fails while the lock is held or while any waiter is queued: FIFO
    /// order admits no queue jumping.
    pub fn try_acquire(&self) -> Option<FifoGuard<'_>> {
        let mut state = self.state.lock();
        if state.held || !state.queue.is_empty() {
            return None;
        }
        state.held = true;
        drop(state);
        Some(FifoGuard { lock: self })
    }

    /// Hands the lock to the queue head, or frees it.
    fn unlock(&self) {
        // Extract the waker to wake outside the lock.
        let waker = {
            let mut state = self.state.lock();
            match state.queue.front_mut() {
                Some(front) => {
                    // Direct handoff: held stays true and the head waiter
                    // owns the lock from this point on.
                    front.granted = true;
                    Some(front.waker.clone())
                }
                None => {
                    state.held = false;
                    None
                }
            }
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl Default for FifoLock {
    fn default() -> Self {
        Self::new()
    }
}

/// Future returned by [`FifoLock::acquire`].
#[derive(Debug)]
pub struct FifoLockFuture<'a> {
    lock: &'a FifoLock,
    waiter_id: Option<u64>,
}

impl<'a> Future for FifoLockFuture<'a> {
    type Output = FifoGuard<'a>;

    fn poll(mut self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.lock.state.lock();

        if let Some(id) = self.waiter_id {
            if let Some(pos) = state.queue.iter().position(|w| w.id == id) {
                if state.queue[pos].granted {
                    // The previous holder handed us the lock; held is
                    // already true on our behalf.
                    state.queue.remove(pos);
                    drop(state);
                    self.waiter_id = None;
                    return Poll::Ready(FifoGuard { lock: self.lock });
                }
                // Still queued — update the waker in case it changed.
                if let Some(waiter) = state.queue.get_mut(pos) {
                    if !waiter.waker.will_wake(context.waker()) {
                        waiter.waker.clone_from(context.waker());
                    }
                }
                return Poll::Pending;
            }
            // Entry vanished (not possible under handoff, where only the
            // owning future removes its entry) — re-register at the front
            // so our turn is not lost.
            let new_id = state.next_waiter_id;
            state.next_waiter_id += 1;
            state.queue.push_front(Waiter {
                id: new_id,
                waker: context.waker().clone(),
                granted: false,
            });
            drop(state);
            self.waiter_id = Some(new_id);
            return Poll::Pending;
        }

        if !state.held && state.queue.is_empty() {
            state.held = true;
            drop(state);
            return Poll::Ready(FifoGuard { lock: self.lock });
        }

        let id = state.next_waiter_id;
        state.next_waiter_id += 1;
        state.queue.push_back(Waiter {
            id,
            waker: context.waker().clone(),
            granted: false,
        });
        drop(state);
        self.waiter_id = Some(id);
        Poll::Pending
    }
}

impl Drop for FifoLockFuture<'_> {
    fn drop(&mut self) {
        let Some(id) = self.waiter_id else { return };
        let granted = {
            let mut state = self.lock.state.lock();
            match state.queue.iter().position(|w| w.id == id) {
                Some(pos) => {
                    let granted = state.queue[pos].granted;
                    state.queue.remove(pos);
                    granted
                }
                None => false,
            }
        };
        // We held a grant we never observed; pass the lock on so the
        // handoff signal is not lost.
        if granted {
            self.lock.unlock();
        }
    }
}

/// Release capability for [`FifoLock`]: relinquishes the lock when dropped.
#[must_use = "guard will be immediately released if not held"]
#[derive(Debug)]
pub struct FifoGuard<'a> {
    lock: &'a FifoLock,
}

impl Drop for FifoGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}
