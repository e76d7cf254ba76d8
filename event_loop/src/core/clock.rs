// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Time source injected into the [`EventLoop`]. Timer deadlines and the blocking wait
//! bound are both computed from [`Clock::now()`].
//!
//! [`EventLoop`]: crate::EventLoop

use std::{cell::Cell,
          fmt::Debug,
          rc::Rc,
          time::{Duration, Instant}};

/// Monotonic time source.
pub trait Clock: Debug {
    fn now(&self) -> Instant;

    /// Lets `duration` pass. The loop calls this when it has timers but no descriptors
    /// to wait on.
    fn sleep(&self, duration: Duration);
}

/// The real monotonic clock ([`Instant::now()`]).
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant { Instant::now() }

    fn sleep(&self, duration: Duration) { std::thread::sleep(duration); }
}

/// A clock that only moves when told to. Clones share the same time, so a test can keep
/// one copy and hand another to the loop.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl Default for ManualClock {
    fn default() -> Self { Self::new() }
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) { self.now.set(self.now.get() + by); }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant { self.now.get() }

    /// Returns at once, with the clock moved forward by `duration`.
    fn sleep(&self, duration: Duration) { self.advance(duration); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let other = clock.clone();
        let start = other.now();
        clock.advance(Duration::from_millis(25));
        assert_eq!(other.now() - start, Duration::from_millis(25));
    }

    #[test]
    fn test_manual_clock_sleep_advances() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.sleep(Duration::from_secs(3_600));
        assert_eq!(clock.now() - start, Duration::from_secs(3_600));
    }
}
