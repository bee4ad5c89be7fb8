//! Timer support for delay-based retry loops.
//!
//! [`sleep`] is the only suspension point in the crate that is driven by
//! time rather than by a release-side wake. It backs the fixed-delay retry
//! of [`PollingLock`](crate::sync::PollingLock) and the simulated work in
//! the demo drivers.

mod sleep;
mod timer;

pub use sleep::{sleep, Sleep};
