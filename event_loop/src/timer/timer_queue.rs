// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Insertion-sorted queue of one-shot timers.
//!
//! The queue only stores timers and answers "what fired" and "how long until the next
//! deadline". Invoking callbacks is done by [`EventLoop::poll_timers()`], which detaches
//! the expired timer with [`TimerQueue::pop_expired()`] first, so the callback is free to
//! create or delete timers.
//!
//! [`EventLoop::poll_timers()`]: crate::EventLoop::poll_timers

use crate::{EventLoop, EventLoopResult};
use std::{collections::VecDeque,
          fmt::{Debug, Display, Formatter},
          time::{Duration, Instant}};

/// Runs once when its timer expires.
pub type TimerCallback = Box<dyn FnOnce(&mut EventLoop) -> EventLoopResult<()>>;

/// Identifies a live timer. Ids grow monotonically and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

impl Display for TimerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "T{}", self.0) }
}

struct Timer {
    deadline: Instant,
    id: TimerId,
    callback: TimerCallback,
}

impl Debug for Timer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("deadline", &self.deadline)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// A timer that has been detached from the queue because its deadline passed. The
/// caller owns it now.
#[allow(missing_debug_implementations)]
pub struct ExpiredTimer {
    pub id: TimerId,
    pub callback: TimerCallback,
}

/// Timers sorted ascending by deadline. Equal deadlines keep creation order.
#[derive(Debug)]
pub struct TimerQueue {
    timers: VecDeque<Timer>,
    next_id: u64,
}

impl Default for TimerQueue {
    fn default() -> Self { Self::new() }
}

impl TimerQueue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            timers: VecDeque::new(),
            next_id: 1,
        }
    }

    /// Schedules `callback` to run `delay` after `now`.
    ///
    /// Linear scan for the insertion point. A new timer goes after every existing timer
    /// with the same deadline.
    pub fn create(
        &mut self,
        now: Instant,
        delay: Duration,
        callback: TimerCallback,
    ) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;

        let deadline = now + delay;
        let index = self
            .timers
            .iter()
            .position(|timer| timer.deadline > deadline)
            .unwrap_or(self.timers.len());
        self.timers.insert(index, Timer {
            deadline,
            id,
            callback,
        });
        id
    }

    /// Removes the timer with this id. Unknown ids (already fired, already deleted) are
    /// ignored. Returns whether a timer was removed.
    pub fn delete(&mut self, id: TimerId) -> bool {
        match self.timers.iter().position(|timer| timer.id == id) {
            Some(index) => {
                drop(self.timers.remove(index));
                true
            }
            None => false,
        }
    }

    /// Detaches the earliest timer if its deadline is at or before `now`.
    pub fn pop_expired(&mut self, now: Instant) -> Option<ExpiredTimer> {
        if self.timers.front()?.deadline > now {
            return None;
        }
        let Timer { id, callback, .. } = self.timers.pop_front()?;
        Some(ExpiredTimer { id, callback })
    }

    /// How long a blocking wait may sleep before the next deadline.
    ///
    /// - [`None`]: no timers, wait indefinitely.
    /// - [`Duration::ZERO`]: the earliest timer already expired, re-poll immediately.
    #[must_use]
    pub fn time_until_next(&self, now: Instant) -> Option<Duration> {
        self.timers
            .front()
            .map(|timer| timer.deadline.saturating_duration_since(now))
    }

    #[must_use]
    pub fn len(&self) -> usize { self.timers.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.timers.is_empty() }

    /// Ids in firing order.
    pub fn ids(&self) -> impl Iterator<Item = TimerId> + '_ {
        self.timers.iter().map(|timer| timer.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn noop() -> TimerCallback { Box::new(|_| Ok(())) }

    fn ms(it: u64) -> Duration { Duration::from_millis(it) }

    #[test]
    fn test_ids_are_monotonic() {
        let now = Instant::now();
        let mut queue = TimerQueue::new();
        let a = queue.create(now, ms(5), noop());
        let b = queue.create(now, ms(1), noop());
        assert!(a < b);
        assert!(queue.delete(a));
        let c = queue.create(now, ms(5), noop());
        assert!(b < c);
    }

    #[test_case(&[50, 10, 30], &[2, 3, 1] ; "spread")]
    #[test_case(&[10, 10, 10], &[1, 2, 3] ; "ties keep creation order")]
    #[test_case(&[0, 40, 20, 40], &[1, 3, 2, 4] ; "mixed")]
    fn test_sorted_insertion(delays: &[u64], expected_ids: &[u64]) {
        let now = Instant::now();
        let mut queue = TimerQueue::new();
        for delay in delays {
            queue.create(now, ms(*delay), noop());
        }
        let ids = queue.ids().map(|it| it.0).collect::<Vec<_>>();
        assert_eq!(ids, expected_ids);
    }

    #[test]
    fn test_pop_expired_respects_deadline() {
        let now = Instant::now();
        let mut queue = TimerQueue::new();
        let id = queue.create(now, ms(10), noop());

        assert!(queue.pop_expired(now).is_none());
        assert!(queue.pop_expired(now + ms(9)).is_none());
        assert_eq!(queue.pop_expired(now + ms(10)).map(|it| it.id), Some(id));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let now = Instant::now();
        let mut queue = TimerQueue::new();
        let id = queue.create(now, ms(10), noop());
        assert!(queue.delete(id));
        assert!(!queue.delete(id));
        assert!(!queue.delete(TimerId(999)));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_time_until_next() {
        let now = Instant::now();
        let mut queue = TimerQueue::new();
        assert_eq!(queue.time_until_next(now), None);

        queue.create(now, ms(30), noop());
        queue.create(now, ms(10), noop());
        assert_eq!(queue.time_until_next(now), Some(ms(10)));
        assert_eq!(queue.time_until_next(now + ms(4)), Some(ms(6)));
        assert_eq!(queue.time_until_next(now + ms(50)), Some(Duration::ZERO));
    }
}
