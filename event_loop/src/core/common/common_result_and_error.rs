// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Result type used by every fallible operation and every callback in this crate, and
//! the diagnostic error type for the failures the loop itself can produce.
//!
//! Callbacks are free to fail with any [`miette::Report`]. Such a report propagates out
//! of [`do_one_event()`] and is caught, reported, and recovered from by
//! [`start_event_loop()`].
//!
//! [`do_one_event()`]: crate::EventLoop::do_one_event
//! [`start_event_loop()`]: crate::EventLoop::start_event_loop

use crate::UiId;
use miette::Diagnostic;

/// Type alias to make it easy to work with [`Result`]s that carry a
/// [`miette::Report`].
pub type EventLoopResult<T> = miette::Result<T>;

/// Failures produced by the event loop itself (as opposed to errors raised by
/// callbacks).
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum EventLoopError {
    /// The self-pipe used to wake a blocked readiness wait could not be created.
    #[error("Failed to create the async signal wake pipe")]
    #[diagnostic(
        code(r3bl_event_loop::wake_pipe_creation),
        help("This usually means the system ran out of file descriptors")
    )]
    WakePipeCreation(#[source] std::io::Error),

    /// [`signal_hook`] refused to install a handler for this signal.
    #[error("Failed to install an OS handler for signal {signal}")]
    #[diagnostic(
        code(r3bl_event_loop::signal_registration),
        help("SIGKILL, SIGSTOP, SIGILL, SIGFPE and SIGSEGV can't be handled")
    )]
    SignalRegistration {
        signal: i32,
        #[source]
        source: std::io::Error,
    },

    /// The readiness primitive failed with something other than `EINTR`.
    #[error("Waiting for file descriptor readiness failed")]
    #[diagnostic(
        code(r3bl_event_loop::wait_for_event),
        help("A registered descriptor may have been closed without deleting its handler")
    )]
    WaitForEvent(#[source] std::io::Error),

    /// A console id was used after the console was removed.
    #[error("There is no console with id {0}")]
    #[diagnostic(code(r3bl_event_loop::unknown_console))]
    UnknownConsole(UiId),

    /// Writing to a console's output failed.
    #[error("Writing console output failed")]
    #[diagnostic(code(r3bl_event_loop::console_output))]
    ConsoleOutput(#[source] std::io::Error),

    /// Reading from a console's input failed.
    #[error("Reading console input failed")]
    #[diagnostic(code(r3bl_event_loop::console_input))]
    ConsoleInput(#[source] std::io::Error),
}
