// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Monitored descriptors, keyed by fd, stored in a [`Slab`] so that the round-robin
//! cursor is a stable handle rather than a pointer into a list.
//!
//! # Round-robin service
//!
//! Each wait dispatches exactly one ready descriptor. [`select_next_ready()`] starts at
//! the cursor, walks the handlers in key order (wrapping), picks the first one with
//! pending readiness, and moves the cursor to the entry after it. A descriptor that is
//! always ready can't starve the others because the cursor always moves past the entry
//! that was just serviced.
//!
//! ```text
//!  keys:     [0: fd 3] [1: fd 5] [2: fd 7]
//!  cursor:       ▲
//!  ready:      yes       yes       no
//!  select → fd 3, cursor → key 1
//!  select → fd 5, cursor → key 2
//!  select → fd 3 (key 2 not ready, wraps), cursor → key 1
//! ```
//!
//! # Cursor invariant
//!
//! The cursor is either [`None`] or the key of a live entry. [`remove()`] moves the cursor
//! to the next live entry *before* removing the entry it points at (or to [`None`] if
//! that was the only entry).
//!
//! [`remove()`]: FileHandlerRegistry::remove
//! [`select_next_ready()`]: FileHandlerRegistry::select_next_ready

use super::{FdInterest, FdReadiness, FileHandlerEvent};
use crate::{EventLoop, EventLoopResult};
use slab::Slab;
use std::{fmt::{Debug, Formatter},
          os::fd::RawFd,
          rc::Rc};

/// Invoked when a monitored descriptor becomes ready. Shared ([`Rc`]) so the loop can
/// call it while the callback itself re-registers or deletes its own descriptor.
pub type FileHandlerFn = Rc<dyn Fn(&mut EventLoop, FileHandlerEvent) -> EventLoopResult<()>>;

pub struct FileHandler {
    pub fd: RawFd,
    pub interest: FdInterest,
    pub callback: FileHandlerFn,
    /// Readiness observed by the most recent wait, not yet serviced.
    pub readiness: FdReadiness,
}

impl Debug for FileHandler {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHandler")
            .field("fd", &self.fd)
            .field("interest", &self.interest)
            .field("readiness", &self.readiness)
            .finish_non_exhaustive()
    }
}

/// Result of [`FileHandlerRegistry::upsert()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// First registration of this fd.
    Added,
    /// The fd was already registered. Its callback was replaced.
    Updated { interest_changed: bool },
}

/// A descriptor picked for service, along with the callback to run.
#[allow(missing_debug_implementations)]
pub struct SelectedHandler {
    pub event: FileHandlerEvent,
    pub callback: FileHandlerFn,
}

#[derive(Debug, Default)]
pub struct FileHandlerRegistry {
    handlers: Slab<FileHandler>,
    next_to_service: Option<usize>,
}

impl FileHandlerRegistry {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Registers `fd`, or updates the callback and interest if it is already registered.
    /// There is never more than one entry per fd.
    pub fn upsert(
        &mut self,
        fd: RawFd,
        interest: FdInterest,
        callback: FileHandlerFn,
    ) -> Upsert {
        if let Some(key) = self.key_of(fd) {
            let handler = &mut self.handlers[key];
            let interest_changed = handler.interest != interest;
            handler.interest = interest;
            handler.callback = callback;
            return Upsert::Updated { interest_changed };
        }
        self.handlers.insert(FileHandler {
            fd,
            interest,
            callback,
            readiness: FdReadiness::default(),
        });
        Upsert::Added
    }

    /// Removes the entry for `fd`, fixing up the cursor first. Returns [`None`] if `fd`
    /// isn't registered.
    pub fn remove(&mut self, fd: RawFd) -> Option<FileHandler> {
        let key = self.key_of(fd)?;
        if self.next_to_service == Some(key) {
            self.next_to_service = self.next_live_key_after(key).filter(|&next| next != key);
        }
        let removed = self.handlers.remove(key);
        debug_assert!(
            self.next_to_service
                .is_none_or(|cursor| self.handlers.contains(cursor)),
            "round-robin cursor points at a handler that is not registered"
        );
        Some(removed)
    }

    #[must_use]
    pub fn contains(&self, fd: RawFd) -> bool { self.key_of(fd).is_some() }

    #[must_use]
    pub fn get(&self, fd: RawFd) -> Option<&FileHandler> {
        self.key_of(fd).map(|key| &self.handlers[key])
    }

    #[must_use]
    pub fn len(&self) -> usize { self.handlers.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.handlers.is_empty() }

    /// Fd of the entry the next selection starts from.
    #[must_use]
    pub fn next_to_service(&self) -> Option<RawFd> {
        self.next_to_service.map(|key| self.handlers[key].fd)
    }

    /// `(fd, interest)` for every entry, in service order.
    #[must_use]
    pub fn interests(&self) -> Vec<(RawFd, FdInterest)> {
        self.handlers
            .iter()
            .map(|(_, handler)| (handler.fd, handler.interest))
            .collect()
    }

    pub fn clear_readiness(&mut self) {
        for (_, handler) in &mut self.handlers {
            handler.readiness = FdReadiness::default();
        }
    }

    /// Records what a wait observed for `fd`, masked by the handler's interest. Returns
    /// `false` if `fd` isn't registered (eg: it was deleted while the wait was blocked).
    pub fn set_readiness(&mut self, fd: RawFd, readiness: FdReadiness) -> bool {
        let Some(key) = self.key_of(fd) else {
            return false;
        };
        let handler = &mut self.handlers[key];
        handler.readiness = readiness.masked_by(handler.interest);
        true
    }

    /// Picks the next ready entry in round-robin order, clears its readiness, and
    /// advances the cursor past it. Returns [`None`] (cursor unchanged) if nothing is
    /// ready.
    pub fn select_next_ready(&mut self) -> Option<SelectedHandler> {
        let keys = self.handlers.iter().map(|(key, _)| key).collect::<Vec<_>>();
        let start = self
            .next_to_service
            .and_then(|cursor| keys.iter().position(|&key| key == cursor))
            .unwrap_or(0);

        let count = keys.len();
        let chosen = (0..count)
            .map(|offset| (start + offset) % count)
            .find(|&index| self.handlers[keys[index]].readiness.is_ready())?;

        self.next_to_service = Some(keys[(chosen + 1) % count]);

        let handler = &mut self.handlers[keys[chosen]];
        let event = FileHandlerEvent {
            fd: handler.fd,
            error: handler.readiness.error,
        };
        handler.readiness = FdReadiness::default();
        Some(SelectedHandler {
            event,
            callback: Rc::clone(&handler.callback),
        })
    }

    fn key_of(&self, fd: RawFd) -> Option<usize> {
        self.handlers
            .iter()
            .find(|(_, handler)| handler.fd == fd)
            .map(|(key, _)| key)
    }

    /// Next live key after `key` in key order, wrapping to the first. May return `key`
    /// itself when it is the only entry.
    fn next_live_key_after(&self, key: usize) -> Option<usize> {
        let mut keys = self.handlers.iter().map(|(it, _)| it);
        let first = keys.next()?;
        Some(
            self.handlers
                .iter()
                .map(|(it, _)| it)
                .find(|&it| it > key)
                .unwrap_or(first),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn noop() -> FileHandlerFn { Rc::new(|_, _| Ok(())) }

    fn ready() -> FdReadiness {
        FdReadiness {
            readable: true,
            ..FdReadiness::default()
        }
    }

    fn registry_with(fds: &[RawFd]) -> FileHandlerRegistry {
        let mut registry = FileHandlerRegistry::new();
        for fd in fds {
            registry.upsert(*fd, FdInterest::READABLE, noop());
        }
        registry
    }

    fn select_fd(registry: &mut FileHandlerRegistry) -> Option<RawFd> {
        registry.select_next_ready().map(|it| it.event.fd)
    }

    #[test]
    fn test_upsert_same_fd_updates_instead_of_duplicating() {
        let mut registry = registry_with(&[3]);
        let result = registry.upsert(3, FdInterest::WRITABLE, noop());
        assert_eq!(result, Upsert::Updated {
            interest_changed: true
        });
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(3).unwrap().interest, FdInterest::WRITABLE);
    }

    #[test]
    fn test_round_robin_alternates_between_always_ready() {
        let mut registry = registry_with(&[3, 5]);
        let mut serviced = vec![];
        for _ in 0..4 {
            registry.set_readiness(3, ready());
            registry.set_readiness(5, ready());
            serviced.push(select_fd(&mut registry).unwrap());
        }
        assert_eq!(serviced, vec![3, 5, 3, 5]);
    }

    #[test]
    fn test_every_ready_fd_serviced_once_per_n_cycles() {
        let fds = [4, 8, 15, 16, 23];
        let mut registry = registry_with(&fds);
        let mut serviced = vec![];
        for _ in 0..fds.len() {
            registry.clear_readiness();
            for fd in fds {
                registry.set_readiness(fd, ready());
            }
            serviced.push(select_fd(&mut registry).unwrap());
        }
        serviced.sort_unstable();
        assert_eq!(serviced, fds.to_vec());
    }

    #[test]
    fn test_nothing_ready_leaves_cursor_alone() {
        let mut registry = registry_with(&[3, 5]);
        registry.set_readiness(3, ready());
        assert_eq!(select_fd(&mut registry), Some(3));
        assert_eq!(registry.next_to_service(), Some(5));
        assert_eq!(select_fd(&mut registry), None);
        assert_eq!(registry.next_to_service(), Some(5));
    }

    #[test]
    fn test_uninteresting_readiness_is_ignored() {
        let mut registry = registry_with(&[3]);
        registry.set_readiness(3, FdReadiness {
            writable: true,
            ..FdReadiness::default()
        });
        assert_eq!(select_fd(&mut registry), None);
    }

    #[test]
    fn test_remove_entry_under_cursor_advances_cursor() {
        let mut registry = registry_with(&[3, 5, 7]);
        registry.set_readiness(3, ready());
        assert_eq!(select_fd(&mut registry), Some(3));
        assert_eq!(registry.next_to_service(), Some(5));

        assert!(registry.remove(5).is_some());
        assert_eq!(registry.next_to_service(), Some(7));

        assert!(registry.remove(7).is_some());
        assert_eq!(registry.next_to_service(), Some(3));

        assert!(registry.remove(3).is_some());
        assert_eq!(registry.next_to_service(), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut registry = registry_with(&[3]);
        assert!(registry.remove(3).is_some());
        assert!(registry.remove(3).is_none());
        assert!(registry.remove(42).is_none());
    }

    #[test]
    fn test_error_flag_reaches_event() {
        let mut registry = registry_with(&[9]);
        registry.set_readiness(9, FdReadiness {
            error: true,
            ..FdReadiness::default()
        });
        let selected = registry.select_next_ready().unwrap();
        assert_eq!(selected.event, FileHandlerEvent { fd: 9, error: true });
    }
}
