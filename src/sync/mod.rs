//! Synchronization primitives for cooperatively scheduled tasks.
//!
//! Four primitives with distinct contention-handling strategies:
//!
//! - [`PollingLock`]: mutual exclusion via fixed-delay retry. Unfair by
//!   design, no wait queue, explicit `release` instead of a guard.
//! - [`FifoLock`]: mutual exclusion with strict arrival-order granting and
//!   direct handoff on release.
//! - [`Semaphore`]: bounded counting semaphore admitting up to a configured
//!   number of concurrent holders, FIFO among waiters.
//! - [`RwLock`]: shared readers or one exclusive writer, with writer
//!   preference to prevent writer starvation.
//!
//! # Guards as release capabilities
//!
//! The queue-based primitives hand acquisition back as a guard. The guard is
//! the sole way to release, so releasing a lock you do not hold is
//! unrepresentable. Dropping a guard always releases exactly once, including
//! on panic unwind. `PollingLock` is the deliberate exception: its explicit
//! `release` matches its degenerate no-queue model.
//!
//! # Cancellation
//!
//! Dropping an acquisition future before it completes is clean: the waiter
//! entry is removed, and any grant signal that already targeted it is
//! forwarded to the next waiter rather than lost.

mod fifo;
mod polling;
mod rwlock;
mod semaphore;

pub use fifo::{FifoGuard, FifoLock, FifoLockFuture};
pub use polling::{PollingAcquire, PollingLock};
pub use rwlock::{ReadFuture, ReadGuard, RwLock, WriteFuture, WriteGuard};
pub use semaphore::{Semaphore, SemaphoreAcquire, SemaphorePermit};
