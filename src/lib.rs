//! In-process concurrency-control primitives for cooperatively scheduled
//! asynchronous tasks.
//!
//! The crate provides four independent primitives, each a self-contained
//! state machine with no shared state between them:
//!
//! - [`sync::PollingLock`]: mutual exclusion via fixed-delay busy-wait retry
//! - [`sync::FifoLock`]: mutual exclusion via an ordered wait queue with
//!   direct handoff
//! - [`sync::Semaphore`]: bounded concurrency via a permit counter plus a
//!   FIFO wait queue
//! - [`sync::RwLock`]: shared read / exclusive write access with writer
//!   preference
//!
//! # Release capabilities
//!
//! A successful acquisition returns a guard ([`sync::FifoGuard`],
//! [`sync::SemaphorePermit`], [`sync::ReadGuard`], [`sync::WriteGuard`])
//! that releases the resource exactly once, on drop. Release therefore
//! happens on every exit path of the protected section, including panics.
//! [`sync::PollingLock`] is the exception: it pairs an `acquire` future with
//! an explicit `release` call and deliberately guards nothing.
//!
//! # Scheduling model
//!
//! The primitives never block a thread and perform no I/O. A caller suspends
//! exactly where it must wait (a timer retry for `PollingLock`, a queue entry
//! for the others) and resumes when a release wakes it. There is no
//! cancellation or timeout support for a pending acquisition: dropping a
//! pending acquire future is the only way out of a queue.
//!
//! # Example
//!
//! ```
//! use coopsync::sync::Semaphore;
//!
//! let sem = Semaphore::new(2).expect("positive permit count");
//! let first = sem.try_acquire().expect("two permits free");
//! let second = sem.try_acquire().expect("one permit free");
//! assert!(sem.try_acquire().is_none());
//! drop(first);
//! assert!(sem.try_acquire().is_some());
//! # drop(second);
//! ```

pub mod error;
pub mod lab;
pub mod sync;
pub mod test_utils;
pub mod time;

pub use error::InvalidConfiguration;
