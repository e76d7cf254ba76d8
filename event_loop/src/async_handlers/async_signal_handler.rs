// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Deferred reactions to OS signals.
//!
//! # Signal context
//!
//! The only thing that may run in a real OS signal handler is
//! [`AsyncSignalMarker::mark()`]: one atomic store and one `write(2)` to the
//! [`WakePipe`]. Everything else in the loop is touched only from the loop's own
//! thread. The handler's callback runs later, from [`invoke_async_signal_handlers()`].
//!
//! # No lost wakeups
//!
//! The driver drains the wake pipe *before* scanning, and each handler's flag is
//! cleared with a compare-exchange *before* its callback runs. A mark that lands
//! during the scan either gets picked up by the same scan, or leaves a byte in the pipe
//! (and the flag set) for the next wait to see. A single mark never runs the callback
//! twice.
//!
//! [`invoke_async_signal_handlers()`]: crate::EventLoop::invoke_async_signal_handlers

use super::WakePipe;
use crate::{EventLoop, EventLoopResult};
use signal_hook::SigId;
use std::{fmt::{Display, Formatter},
          rc::Rc,
          sync::{Arc,
                 atomic::{AtomicBool, Ordering}}};

pub type AsyncSignalHandlerFn = Rc<dyn Fn(&mut EventLoop) -> EventLoopResult<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AsyncSignalHandlerId(pub u64);

impl Display for AsyncSignalHandlerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "S{}", self.0) }
}

/// `Send + Sync` handle that marks one async signal handler ready. Safe to call from a
/// real OS signal handler, or from any thread.
#[derive(Debug, Clone)]
pub struct AsyncSignalMarker {
    ready: Arc<AtomicBool>,
    wake: Arc<WakePipe>,
}

impl AsyncSignalMarker {
    /// Async-signal-safe.
    pub fn mark(&self) {
        self.ready.store(true, Ordering::SeqCst);
        self.wake.wake();
    }

    #[must_use]
    pub fn is_marked(&self) -> bool { self.ready.load(Ordering::SeqCst) }
}

struct AsyncSignalHandler {
    id: AsyncSignalHandlerId,
    marker: AsyncSignalMarker,
    callback: AsyncSignalHandlerFn,
    /// Set when a real OS signal was wired to this handler.
    os_signal: Option<SigId>,
}

/// Ordered list of async signal handlers. Registration order is the scan order.
#[allow(missing_debug_implementations)]
#[derive(Default)]
pub struct AsyncSignalHandlerRegistry {
    handlers: Vec<AsyncSignalHandler>,
    next_id: u64,
    /// Created with the first handler, then kept for the life of the loop.
    wake: Option<Arc<WakePipe>>,
}

impl AsyncSignalHandlerRegistry {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// # Errors
    ///
    /// [`EventLoopError::WakePipeCreation`] if this is the first handler and the wake
    /// pipe can't be created.
    ///
    /// [`EventLoopError::WakePipeCreation`]: crate::EventLoopError::WakePipeCreation
    pub fn create(
        &mut self,
        callback: AsyncSignalHandlerFn,
    ) -> EventLoopResult<AsyncSignalHandlerId> {
        let wake = match &self.wake {
            Some(it) => Arc::clone(it),
            None => {
                let it = Arc::new(WakePipe::try_new()?);
                self.wake = Some(Arc::clone(&it));
                it
            }
        };
        self.next_id += 1;
        let id = AsyncSignalHandlerId(self.next_id);
        self.handlers.push(AsyncSignalHandler {
            id,
            marker: AsyncSignalMarker {
                ready: Arc::new(AtomicBool::new(false)),
                wake,
            },
            callback,
            os_signal: None,
        });
        Ok(id)
    }

    #[must_use]
    pub fn marker(&self, id: AsyncSignalHandlerId) -> Option<AsyncSignalMarker> {
        self.find(id).map(|it| it.marker.clone())
    }

    /// Returns `false` if `id` is unknown.
    pub fn mark(&self, id: AsyncSignalHandlerId) -> bool {
        let Some(handler) = self.find(id) else {
            return false;
        };
        handler.marker.mark();
        true
    }

    /// Returns `false` if `id` is unknown.
    pub fn clear(&self, id: AsyncSignalHandlerId) -> bool {
        let Some(handler) = self.find(id) else {
            return false;
        };
        handler.marker.ready.store(false, Ordering::SeqCst);
        true
    }

    #[must_use]
    pub fn is_marked(&self, id: AsyncSignalHandlerId) -> bool {
        self.find(id).is_some_and(|it| it.marker.is_marked())
    }

    /// Remembers the OS registration so [`delete()`] can undo it.
    ///
    /// [`delete()`]: Self::delete
    pub fn attach_os_signal(&mut self, id: AsyncSignalHandlerId, sig_id: SigId) -> bool {
        match self.handlers.iter_mut().find(|it| it.id == id) {
            Some(handler) => {
                handler.os_signal = Some(sig_id);
                true
            }
            None => false,
        }
    }

    /// Removes the handler even if it is marked; it never runs again. Also unregisters
    /// the OS signal hook attached to it, if any. Returns `false` if `id` is unknown.
    pub fn delete(&mut self, id: AsyncSignalHandlerId) -> bool {
        let Some(index) = self.handlers.iter().position(|it| it.id == id) else {
            return false;
        };
        let handler = self.handlers.remove(index);
        if let Some(sig_id) = handler.os_signal {
            signal_hook::low_level::unregister(sig_id);
        }
        true
    }

    #[must_use]
    pub fn len(&self) -> usize { self.handlers.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.handlers.is_empty() }

    /// The wake pipe's read end, while at least one handler exists.
    #[must_use]
    pub fn wake_fd(&self) -> Option<std::os::fd::RawFd> {
        if self.handlers.is_empty() {
            return None;
        }
        self.wake.as_ref().map(|it| it.read_fd())
    }

    pub fn clear_wake(&self) {
        if let Some(wake) = &self.wake {
            wake.clear();
        }
    }

    /// Atomically claims the first marked handler in registration order: its flag goes
    /// from `true` to `false` before the callback is handed out.
    pub fn take_next_ready(&self) -> Option<(AsyncSignalHandlerId, AsyncSignalHandlerFn)> {
        self.handlers.iter().find_map(|it| {
            it.marker
                .ready
                .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
                .ok()
                .map(|_| (it.id, Rc::clone(&it.callback)))
        })
    }

    fn find(&self, id: AsyncSignalHandlerId) -> Option<&AsyncSignalHandler> {
        self.handlers.iter().find(|it| it.id == id)
    }
}

impl Drop for AsyncSignalHandlerRegistry {
    fn drop(&mut self) {
        for handler in &self.handlers {
            if let Some(sig_id) = handler.os_signal {
                signal_hook::low_level::unregister(sig_id);
            }
        }
    }
}
