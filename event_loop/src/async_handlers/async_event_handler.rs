// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Deferred callbacks marked ready by ordinary program code (never from signal
//! context, so a plain `bool` is enough and no wake is needed: whoever marks is about
//! to return to the driver anyway).
//!
//! [`take_next_ready()`] hands out at most one handler per call. The driver calls it
//! once per turn of its fairness rotation, so a handler that keeps re-marking itself
//! can't starve timers or descriptors.
//!
//! [`take_next_ready()`]: AsyncEventHandlerRegistry::take_next_ready

use crate::{EventLoop, EventLoopResult};
use std::{fmt::{Display, Formatter},
          rc::Rc};

pub type AsyncEventHandlerFn = Rc<dyn Fn(&mut EventLoop) -> EventLoopResult<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AsyncEventHandlerId(pub u64);

impl Display for AsyncEventHandlerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "E{}", self.0) }
}

struct AsyncEventHandler {
    id: AsyncEventHandlerId,
    ready: bool,
    callback: AsyncEventHandlerFn,
}

#[allow(missing_debug_implementations)]
#[derive(Default)]
pub struct AsyncEventHandlerRegistry {
    handlers: Vec<AsyncEventHandler>,
    next_id: u64,
}

impl AsyncEventHandlerRegistry {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    pub fn create(&mut self, callback: AsyncEventHandlerFn) -> AsyncEventHandlerId {
        self.next_id += 1;
        let id = AsyncEventHandlerId(self.next_id);
        self.handlers.push(AsyncEventHandler {
            id,
            ready: false,
            callback,
        });
        id
    }

    /// Returns `false` if `id` is unknown.
    pub fn mark(&mut self, id: AsyncEventHandlerId) -> bool { self.set_ready(id, true) }

    /// Returns `false` if `id` is unknown.
    pub fn clear(&mut self, id: AsyncEventHandlerId) -> bool { self.set_ready(id, false) }

    #[must_use]
    pub fn is_marked(&self, id: AsyncEventHandlerId) -> bool {
        self.handlers.iter().any(|it| it.id == id && it.ready)
    }

    /// Safe while marked: the handler is simply never run. Returns `false` if `id` is
    /// unknown.
    pub fn delete(&mut self, id: AsyncEventHandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|it| it.id != id);
        self.handlers.len() != before
    }

    #[must_use]
    pub fn len(&self) -> usize { self.handlers.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.handlers.is_empty() }

    /// Clears and hands out the first marked handler, if any.
    pub fn take_next_ready(&mut self) -> Option<(AsyncEventHandlerId, AsyncEventHandlerFn)> {
        let handler = self.handlers.iter_mut().find(|it| it.ready)?;
        handler.ready = false;
        Some((handler.id, Rc::clone(&handler.callback)))
    }

    fn set_ready(&mut self, id: AsyncEventHandlerId, ready: bool) -> bool {
        match self.handlers.iter_mut().find(|it| it.id == id) {
            Some(handler) => {
                handler.ready = ready;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn noop() -> AsyncEventHandlerFn { Rc::new(|_| Ok(())) }

    #[test]
    fn test_one_handler_per_call() {
        let mut registry = AsyncEventHandlerRegistry::new();
        let first = registry.create(noop());
        let second = registry.create(noop());
        registry.mark(second);
        registry.mark(first);

        assert_eq!(registry.take_next_ready().map(|it| it.0), Some(first));
        assert!(registry.is_marked(second));
        assert_eq!(registry.take_next_ready().map(|it| it.0), Some(second));
        assert!(registry.take_next_ready().is_none());
    }

    #[test]
    fn test_clear_and_delete() {
        let mut registry = AsyncEventHandlerRegistry::new();
        let id = registry.create(noop());
        registry.mark(id);
        assert!(registry.clear(id));
        assert!(registry.take_next_ready().is_none());

        registry.mark(id);
        assert!(registry.delete(id));
        assert!(!registry.delete(id));
        assert!(!registry.mark(id));
        assert!(registry.take_next_ready().is_none());
        assert!(registry.is_empty());
    }
}
