// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 spindle project

//! Time source abstraction for timer deadlines.
//!
//! Timer deadlines are absolute epoch seconds read through the [`TimeSource`]
//! trait. Production reactors use [`SystemClock`]; tests and simulations use
//! [`ManualClock`], which only advances when told to.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of "now" in epoch seconds.
///
/// The reactor reads the clock a handful of times per tick: once to compute
/// the wait bound and once per timer firing pass. Implementations must be
/// cheap and must never block.
pub trait TimeSource {
    /// Current time in seconds since the Unix epoch.
    fn now(&self) -> u64;
}

/// Wall-clock time source backed by [`SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> u64 {
        // A clock before the epoch reads as 0 rather than panicking.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Manually driven time source for tests and deterministic simulations.
///
/// Clones share the same underlying instant, so a test can keep one clone
/// and hand the other to the reactor:
///
/// ```
/// use spindle::{ManualClock, TimeSource};
///
/// let clock = ManualClock::new(100);
/// let view = clock.clone();
/// clock.advance(3);
/// assert_eq!(view.now(), 103);
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    epoch: Rc<Cell<u64>>,
}

impl ManualClock {
    /// Create a clock frozen at `epoch_secs`.
    pub fn new(epoch_secs: u64) -> Self {
        Self {
            epoch: Rc::new(Cell::new(epoch_secs)),
        }
    }

    /// Move the clock forward by `secs`.
    pub fn advance(&self, secs: u64) {
        self.epoch.set(self.epoch.get().saturating_add(secs));
    }

    /// Jump the clock to an absolute instant.
    pub fn set(&self, epoch_secs: u64) {
        self.epoch.set(epoch_secs);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> u64 {
        self.epoch.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let a = ManualClock::new(10);
        let b = a.clone();
        a.advance(5);
        assert_eq!(b.now(), 15);
        b.set(7);
        assert_eq!(a.now(), 7);
    }

    #[test]
    fn system_clock_is_monotonic_enough() {
        let c = SystemClock;
        let t1 = c.now();
        let t2 = c.now();
        assert!(t2 >= t1);
        assert!(t1 > 1_500_000_000, "wall clock should be past 2017");
    }
}
