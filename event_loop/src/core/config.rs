// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words epoll kqueue

/// Emit per-iteration `debug!` events (dispatch decisions, readiness, cursor moves).
/// Warnings and errors are always logged.
pub const DEBUG_EVENT_LOOP: bool = false;

/// Capacity for the [`mio::Events`] buffer.
pub const DEFAULT_EVENTS_CAPACITY: usize = 64;

/// Read buffer size for console reads (`1_024` bytes).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1_024;

/// Which readiness primitive the notifier uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifierBackendPreference {
    /// Use [`mio`] (epoll / kqueue). The first registration probes it, and the
    /// notifier falls back to `poll(2)` permanently if it rejects a descriptor.
    #[default]
    Auto,
    /// Always use `poll(2)`.
    Poll,
}

/// Settings for an [`EventLoop`].
///
/// [`EventLoop`]: crate::EventLoop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventLoopConfig {
    pub notifier_backend: NotifierBackendPreference,
    pub events_capacity: usize,
    pub read_buffer_size: usize,
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            notifier_backend: NotifierBackendPreference::default(),
            events_capacity: DEFAULT_EVENTS_CAPACITY,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl EventLoopConfig {
    #[must_use]
    pub fn with_notifier_backend(mut self, it: NotifierBackendPreference) -> Self {
        self.notifier_backend = it;
        self
    }

    /// Values below `1` are raised to `1` when the buffer is allocated.
    #[must_use]
    pub fn with_events_capacity(mut self, it: usize) -> Self {
        self.events_capacity = it;
        self
    }

    /// Values below `1` are raised to `1` when the buffer is allocated.
    #[must_use]
    pub fn with_read_buffer_size(mut self, it: usize) -> Self {
        self.read_buffer_size = it;
        self
    }
}
