//! Reader/writer lock with writer-preference fairness.
//!
//! Multiple readers may hold the lock concurrently, or a single writer
//! exclusively. When a writer is waiting, new read requests are blocked
//! until the writer acquires and releases the lock — this prevents writer
//! starvation under heavy read load, at the documented cost of possible
//! reader starvation under continuous write pressure.
//!
//! # Fairness characteristics
//!
//! | Scenario                  | Behavior                                   |
//! |---------------------------|--------------------------------------------|
//! | No writers waiting        | Readers admitted immediately               |
//! | Writer waiting            | New readers blocked until writer completes |
//! | Existing readers + writer | Writer waits for all readers to release    |
//! | Multiple writers          | Writers admitted in arrival order (FIFO)   |
//!
//! Releasing the last read guard wakes the head writer. Releasing a write
//! guard wakes the next writer if one is queued, otherwise every queued
//! reader is woken together (batch wake, no inter-reader ordering).

use parking_lot::Mutex as ParkingMutex;
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

#[derive(Debug, Default)]
struct State {
    readers: usize,
    writer_active: bool,
    /// Writers waiting or woken-but-not-yet-acquired; readers are blocked
    /// while this is non-zero.
    writer_waiters: usize,
    reader_waiters: VecDeque<Waiter>,
    writer_queue: VecDeque<Waiter>,
    next_waiter_id: u64,
}

#[derive(Debug)]
struct Waiter {
    id: u64,
    waker: Waker,
}

/// A reader/writer lock with writer-preference fairness.
///
/// Invariant: `writer_active` implies `readers == 0`, and vice versa — the
/// two sides are mutually exclusive at every transition.
#[derive(Debug, Default)]
pub struct RwLock {
    state: ParkingMutex<State>,
}

impl RwLock {
    /// Creates a new unlocked instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ParkingMutex::new(State::default()),
        }
    }

    /// Returns the number of currently active readers.
    #[must_use]
    pub fn readers(&self) -> usize {
        self.state.lock().readers
    }

    /// Returns true if a writer currently holds the lock.
    #[must_use]
    pub fn is_writer_active(&self) -> bool {
        self.state.lock().writer_active
    }

    /// Returns the number of writers waiting for the lock.
    #[must_use]
    pub fn queued_writers(&self) -> usize {
        self.state.lock().writer_waiters
    }

    /// Returns the number of readers waiting for the lock.
    #[must_use]
    pub fn queued_readers(&self) -> usize {
        self.state.lock().reader_waiters.len()
    }

    /// Acquires shared read access asynchronously.
    ///
    /// Admitted immediately only when no writer is active and none is
    /// waiting (writer preference).
    pub fn read(&self) -> ReadFuture<'_> {
        ReadFuture {
            lock: self,
            waiter_id: None,
        }
    }

    /// Acquires exclusive write access asynchronously.
    pub fn write(&self) -> WriteFuture<'_> {
        WriteFuture {
            lock: self,
            waiter_id: None,
            counted: false,
        }
    }

    /// Tries to acquire read access without waiting.
    pub fn try_read(&self) -> Option<ReadGuard<'_>> {
        let mut state = self.state.lock();
        if state.writer_active || state.writer_waiters > 0 {
            return None;
        }
        state.readers += 1;
        drop(state);
        Some(ReadGuard { lock: self })
    }

    /// Tries to acquire write access without waiting.
    ///
    /// Fails while readers or a writer are active, or while earlier writers
    /// are waiting (queue order is preserved).
    pub fn try_write(&self) -> Option<WriteGuard<'_>> {
        let mut state = self.state.lock();
        if state.writer_active || state.readers > 0 || state.writer_waiters > 0 {
            return None;
        }
        state.writer_active = true;
        drop(state);
        Some(WriteGuard { lock: self })
    }

    #[inline]
    fn pop_writer_waiter(state: &mut State) -> Option<Waker> {
        state.writer_queue.pop_front().map(|w| w.waker)
    }

    #[inline]
    fn drain_reader_waiters(state: &mut State) -> SmallVec<[Waker; 4]> {
        state.reader_waiters.drain(..).map(|w| w.waker).collect()
    }

    #[inline]
    fn release_reader(&self) {
        let waker = {
            let mut state = self.state.lock();
            state.readers = state.readers.saturating_sub(1);
            if state.readers == 0 && state.writer_waiters > 0 {
                Self::pop_writer_waiter(&mut state)
            } else {
                None
            }
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    #[inline]
    fn release_writer(&self) {
        let (writer_waker, reader_wakers) = {
            let mut state = self.state.lock();
            state.writer_active = false;
            if state.writer_waiters > 0 {
                // Writer priority: the next writer goes first.
                (Self::pop_writer_waiter(&mut state), SmallVec::new())
            } else {
                // No writer pending: admit every queued reader together.
                (None, Self::drain_reader_waiters(&mut state))
            }
        };
        if let Some(waker) = writer_waker {
            waker.wake();
        }
        for waker in reader_wakers {
            waker.wake();
        }
    }
}

/// Future returned by [`RwLock::read`].
#[derive(Debug)]
pub struct ReadFuture<'a> {
    lock: &'a RwLock,
    waiter_id: Option<u64>,
}

impl<'a> Future for ReadFuture<'a> {
    type Output = ReadGuard<'a>;

    fn poll(mut self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.lock.state.lock();

        if !state.writer_active && state.writer_waiters == 0 {
            state.readers += 1;
            drop(state);
            return Poll::Ready(ReadGuard { lock: self.lock });
        }

        if let Some(waiter_id) = self.waiter_id {
            if let Some(existing) = state.reader_waiters.iter_mut().find(|w| w.id == waiter_id) {
                if !existing.waker.will_wake(context.waker()) {
                    existing.waker.clone_from(context.waker());
                }
            } else {
                // Drained by a batch wake but a new writer got in first —
                // re-register at the front so our place is kept.
                let new_id = state.next_waiter_id;
                state.next_waiter_id += 1;
                state.reader_waiters.push_front(Waiter {
                    id: new_id,
                    waker: context.waker().clone(),
                });
                drop(state);
                self.waiter_id = Some(new_id);
                return Poll::Pending;
            }
        } else {
            let id = state.next_waiter_id;
            state.next_waiter_id += 1;
            state.reader_waiters.push_back(Waiter {
                id,
                waker: context.waker().clone(),
            });
            drop(state);
            self.waiter_id = Some(id);
            return Poll::Pending;
        }
        drop(state);

        Poll::Pending
    }
}

impl Drop for ReadFuture<'_> {
    fn drop(&mut self) {
        let mut writer_waker = None;
        if let Some(waiter_id) = self.waiter_id {
            let mut state = self.lock.state.lock();
            let initial_len = state.reader_waiters.len();
            state.reader_waiters.retain(|w| w.id != waiter_id);
            let removed = initial_len != state.reader_waiters.len();

            // If we were already drained out and the lock is claimable by a
            // waiting writer, pass the signal on.
            if !removed && state.readers == 0 && !state.writer_active && state.writer_waiters > 0 {
                writer_waker = RwLock::pop_writer_waiter(&mut state);
            }
        }
        if let Some(waker) = writer_waker {
            waker.wake();
        }
    }
}

/// Future returned by [`RwLock::write`].
#[derive(Debug)]
pub struct WriteFuture<'a> {
    lock: &'a RwLock,
    waiter_id: Option<u64>,
    /// Whether this future is included in `writer_waiters`.
    counted: bool,
}

impl<'a> Future for WriteFuture<'a> {
    type Output = WriteGuard<'a>;

    fn poll(mut self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.lock.state.lock();
        if !self.counted {
            state.writer_waiters += 1;
            self.counted = true;
        }

        // Dequeued by release_writer means it is our turn; otherwise we may
        // only acquire when no other writer is waiting ahead of us.
        let dequeued = self
            .waiter_id
            .is_some_and(|id| !state.writer_queue.iter().any(|w| w.id == id));
        let can_acquire =
            !state.writer_active && state.readers == 0 && (dequeued || state.writer_waiters == 1);

        if can_acquire {
            state.writer_active = true;
            state.writer_waiters = state.writer_waiters.saturating_sub(1);
            self.counted = false;
            drop(state);
            return Poll::Ready(WriteGuard { lock: self.lock });
        }

        if let Some(waiter_id) = self.waiter_id {
            if let Some(existing) = state.writer_queue.iter_mut().find(|w| w.id == waiter_id) {
                if !existing.waker.will_wake(context.waker()) {
                    existing.waker.clone_from(context.waker());
                }
            } else {
                // Dequeued but blocked (readers still active) — re-register
                // at the front to keep writer arrival order.
                let new_id = state.next_waiter_id;
                state.next_waiter_id += 1;
                state.writer_queue.push_front(Waiter {
                    id: new_id,
                    waker: context.waker().clone(),
                });
                drop(state);
                self.waiter_id = Some(new_id);
                return Poll::Pending;
            }
        } else {
            let id = state.next_waiter_id;
            state.next_waiter_id += 1;
            state.writer_queue.push_back(Waiter {
                id,
                waker: context.waker().clone(),
            });
            drop(state);
            self.waiter_id = Some(id);
            return Poll::Pending;
        }
        drop(state);

        Poll::Pending
    }
}

impl Drop for WriteFuture<'_> {
    fn drop(&mut self) {
        if !self.counted {
            return;
        }

        let mut writer_waker = None;
        let mut reader_wakers: SmallVec<[Waker; 4]> = SmallVec::new();
        let mut state = self.lock.state.lock();

        if let Some(waiter_id) = self.waiter_id {
            let initial_len = state.writer_queue.len();
            state.writer_queue.retain(|w| w.id != waiter_id);
            let removed = initial_len != state.writer_queue.len();

            state.writer_waiters = state.writer_waiters.saturating_sub(1);

            // Already dequeued means a grant signal targeted us; forward it.
            if !removed && !state.writer_active && state.readers == 0 && state.writer_waiters > 0 {
                writer_waker = RwLock::pop_writer_waiter(&mut state);
            }
        } else {
            state.writer_waiters = state.writer_waiters.saturating_sub(1);
        }

        // The last departing writer unblocks reader admission.
        if state.writer_waiters == 0 && !state.writer_active {
            reader_wakers = RwLock::drain_reader_waiters(&mut state);
        }
        drop(state);

        if let Some(waker) = writer_waker {
            waker.wake();
        }
        for waker in reader_wakers {
            waker.wake();
        }
    }
}

/// Release capability for shared read access: decrements the reader count
/// when dropped.
#[must_use = "guard will be immediately released if not held"]
#[derive(Debug)]
pub struct ReadGuard<'a> {
    lock: &'a RwLock,
}

impl Drop for ReadGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.lock.release_reader();
    }
}

/// Release capability for exclusive write access: clears the writer flag
/// when dropped.
#[must_use = "guard will be immediately released if not held"]
#[derive(Debug)]
pub struct WriteGuard<'a> {
    lock: &'a RwLock,
}

impl Drop for WriteGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.lock.release_writer();
    }
}
