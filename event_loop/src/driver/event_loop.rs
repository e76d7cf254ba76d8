// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The scheduler object. It owns every registry, so several independent loops can
//! coexist (each test builds its own).

use crate::{AsyncEventHandlerRegistry, AsyncSignalHandlerRegistry, Clock, EventLoopConfig,
            FileNotifier, InferiorState, MonotonicClock, TimerQueue, UiRegistry};

/// Position of the driver's fairness rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventSource {
    #[default]
    Timers,
    FileDescriptors,
    AsyncEventHandlers,
}

impl EventSource {
    pub const COUNT: usize = 3;

    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Timers => Self::FileDescriptors,
            Self::FileDescriptors => Self::AsyncEventHandlers,
            Self::AsyncEventHandlers => Self::Timers,
        }
    }
}

/// Single-threaded cooperative event loop.
///
/// | Field                | Holds                                                |
/// | :------------------- | :--------------------------------------------------- |
/// | [`timers`]           | One-shot timers, sorted by deadline                  |
/// | [`notifier`]         | Monitored descriptors and the readiness backend      |
/// | [`signal_handlers`]  | Async signal handlers (markable from signal context) |
/// | [`event_handlers`]   | Async event handlers                                 |
/// | [`uis`]              | Consoles                                             |
/// | [`inferior`]         | Target and queued continuations                      |
///
/// Callbacks get `&mut EventLoop`, so anything registered here may be added, marked, or
/// deleted from inside any callback, including its own.
///
/// [`event_handlers`]: Self::event_handlers
/// [`inferior`]: Self::inferior
/// [`notifier`]: Self::notifier
/// [`signal_handlers`]: Self::signal_handlers
/// [`timers`]: Self::timers
/// [`uis`]: Self::uis
#[allow(missing_debug_implementations)]
pub struct EventLoop {
    pub(crate) config: EventLoopConfig,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) timers: TimerQueue,
    pub(crate) notifier: FileNotifier,
    pub(crate) signal_handlers: AsyncSignalHandlerRegistry,
    pub(crate) event_handlers: AsyncEventHandlerRegistry,
    pub(crate) next_event_source: EventSource,
    pub(crate) uis: UiRegistry,
    pub(crate) inferior: InferiorState,
}

impl Default for EventLoop {
    fn default() -> Self { Self::new() }
}

impl EventLoop {
    #[must_use]
    pub fn new() -> Self { Self::with_config(EventLoopConfig::default()) }

    #[must_use]
    pub fn with_config(config: EventLoopConfig) -> Self {
        Self::with_config_and_clock(config, MonotonicClock)
    }

    #[must_use]
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self::with_config_and_clock(EventLoopConfig::default(), clock)
    }

    #[must_use]
    pub fn with_config_and_clock(config: EventLoopConfig, clock: impl Clock + 'static) -> Self {
        Self {
            notifier: FileNotifier::new(&config),
            config,
            clock: Box::new(clock),
            timers: TimerQueue::new(),
            signal_handlers: AsyncSignalHandlerRegistry::new(),
            event_handlers: AsyncEventHandlerRegistry::new(),
            next_event_source: EventSource::default(),
            uis: UiRegistry::new(),
            inferior: InferiorState::default(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EventLoopConfig { &self.config }

    #[must_use]
    pub fn notifier(&self) -> &FileNotifier { &self.notifier }

    #[must_use]
    pub fn timers(&self) -> &TimerQueue { &self.timers }

    #[must_use]
    pub fn next_event_source(&self) -> EventSource { self.next_event_source }
}
