// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Registration API: file handlers, timers, async signal handlers, async event
//! handlers. Every delete is idempotent: deleting something unknown (already fired,
//! already deleted) is a no-op that returns `false`.

use crate::{AsyncEventHandlerId, AsyncSignalHandlerId, AsyncSignalMarker, DEBUG_EVENT_LOOP,
            EventLoop, EventLoopError, EventLoopResult, FdInterest, FileHandlerEvent, TimerId};
use std::{os::fd::RawFd, rc::Rc, time::Duration};

impl EventLoop {
    /// Monitors `fd` for "readable or error". Registering an fd again replaces its
    /// callback.
    pub fn add_file_handler(
        &mut self,
        fd: RawFd,
        callback: impl Fn(&mut EventLoop, FileHandlerEvent) -> EventLoopResult<()> + 'static,
    ) {
        self.add_file_handler_with_interest(fd, FdInterest::READABLE, callback);
    }

    /// Monitors `fd` for the conditions in `interest`. Error conditions are always
    /// reported through [`FileHandlerEvent::error`].
    pub fn add_file_handler_with_interest(
        &mut self,
        fd: RawFd,
        interest: FdInterest,
        callback: impl Fn(&mut EventLoop, FileHandlerEvent) -> EventLoopResult<()> + 'static,
    ) {
        self.notifier.add(fd, interest, Rc::new(callback));
    }

    /// Safe to call from the handler's own callback.
    pub fn delete_file_handler(&mut self, fd: RawFd) -> bool { self.notifier.remove(fd) }

    pub fn create_timer(
        &mut self,
        delay: Duration,
        callback: impl FnOnce(&mut EventLoop) -> EventLoopResult<()> + 'static,
    ) -> TimerId {
        let id = self
            .timers
            .create(self.clock.now(), delay, Box::new(callback));
        DEBUG_EVENT_LOOP.then(|| {
            tracing::debug!(message = "timer created", timer = %id, ?delay);
        });
        id
    }

    pub fn delete_timer(&mut self, id: TimerId) -> bool { self.timers.delete(id) }

    /// Runs the earliest timer if its deadline has passed. The timer leaves the queue
    /// before its callback runs.
    ///
    /// # Errors
    ///
    /// Whatever the timer's callback returns.
    pub fn poll_timers(&mut self) -> EventLoopResult<bool> {
        let Some(expired) = self.timers.pop_expired(self.clock.now()) else {
            return Ok(false);
        };
        DEBUG_EVENT_LOOP.then(|| {
            tracing::debug!(message = "timer fired", timer = %expired.id);
        });
        (expired.callback)(self)?;
        Ok(true)
    }

    /// # Errors
    ///
    /// [`EventLoopError::WakePipeCreation`] for the first handler, if the wake pipe
    /// can't be created.
    pub fn create_async_signal_handler(
        &mut self,
        callback: impl Fn(&mut EventLoop) -> EventLoopResult<()> + 'static,
    ) -> EventLoopResult<AsyncSignalHandlerId> {
        let id = self.signal_handlers.create(Rc::new(callback))?;
        self.sync_wake_fd();
        Ok(id)
    }

    /// Same as [`AsyncSignalMarker::mark()`].
    pub fn mark_async_signal_handler(&self, id: AsyncSignalHandlerId) -> bool {
        self.signal_handlers.mark(id)
    }

    pub fn clear_async_signal_handler(&self, id: AsyncSignalHandlerId) -> bool {
        self.signal_handlers.clear(id)
    }

    /// The handler is never run again, even if it is marked right now.
    pub fn delete_async_signal_handler(&mut self, id: AsyncSignalHandlerId) -> bool {
        let deleted = self.signal_handlers.delete(id);
        self.sync_wake_fd();
        deleted
    }

    /// A handle that can mark `id` from a real OS signal handler or another thread.
    #[must_use]
    pub fn async_signal_marker(&self, id: AsyncSignalHandlerId) -> Option<AsyncSignalMarker> {
        self.signal_handlers.marker(id)
    }

    /// Creates an async signal handler and has `signal` mark it. The OS handler only
    /// runs [`AsyncSignalMarker::mark()`]; `callback` runs later, from the loop.
    /// Deleting the handler unregisters the OS handler too.
    ///
    /// # Errors
    ///
    /// [`EventLoopError::SignalRegistration`] if the signal can't be handled (eg:
    /// `SIGKILL`), or [`EventLoopError::WakePipeCreation`].
    pub fn install_os_signal_handler(
        &mut self,
        signal: i32,
        callback: impl Fn(&mut EventLoop) -> EventLoopResult<()> + 'static,
    ) -> EventLoopResult<AsyncSignalHandlerId> {
        if signal_hook::consts::FORBIDDEN.contains(&signal) {
            return Err(EventLoopError::SignalRegistration {
                signal,
                source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
            }
            .into());
        }

        let id = self.create_async_signal_handler(callback)?;
        let Some(marker) = self.signal_handlers.marker(id) else {
            return Err(EventLoopError::SignalRegistration {
                signal,
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }
            .into());
        };

        // SAFETY: the action only does an atomic store and a write(2) on a
        // non-blocking pipe, both async-signal-safe.
        let registered = unsafe { signal_hook::low_level::register(signal, move || marker.mark()) };

        match registered {
            Ok(sig_id) => {
                self.signal_handlers.attach_os_signal(id, sig_id);
                tracing::info!(message = "OS signal handler installed", signal, handler = %id);
                Ok(id)
            }
            Err(source) => {
                self.delete_async_signal_handler(id);
                Err(EventLoopError::SignalRegistration { signal, source }.into())
            }
        }
    }

    pub fn create_async_event_handler(
        &mut self,
        callback: impl Fn(&mut EventLoop) -> EventLoopResult<()> + 'static,
    ) -> AsyncEventHandlerId {
        self.event_handlers.create(Rc::new(callback))
    }

    pub fn mark_async_event_handler(&mut self, id: AsyncEventHandlerId) -> bool {
        self.event_handlers.mark(id)
    }

    pub fn clear_async_event_handler(&mut self, id: AsyncEventHandlerId) -> bool {
        self.event_handlers.clear(id)
    }

    pub fn delete_async_event_handler(&mut self, id: AsyncEventHandlerId) -> bool {
        self.event_handlers.delete(id)
    }

    /// The wake pipe is monitored only while there is at least one signal handler, so
    /// it never keeps an otherwise idle loop alive.
    fn sync_wake_fd(&mut self) {
        self.notifier.set_wake_fd(self.signal_handlers.wake_fd());
    }
}
