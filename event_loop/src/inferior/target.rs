// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use crate::{EventLoop, EventLoopResult};

/// What the loop needs from the thing being debugged. Everything else about it
/// (breakpoints, symbols, memory) is outside the loop.
///
/// A target reports that it has something to say by marking the async event handler
/// created by [`EventLoop::attach_target()`] (usually from the file handler on its
/// connection descriptor). The loop then calls [`fetch_inferior_event()`], which is
/// expected to call [`EventLoop::inferior_event_handler()`] with
/// [`InferiorEventKind::ExecComplete`] once the inferior has stopped.
///
/// [`InferiorEventKind::ExecComplete`]: crate::InferiorEventKind::ExecComplete
/// [`fetch_inferior_event()`]: Target::fetch_inferior_event
pub trait Target {
    /// Consumes one pending event from the target.
    ///
    /// # Errors
    ///
    /// Any failure talking to the target.
    fn fetch_inferior_event(&self, event_loop: &mut EventLoop) -> EventLoopResult<()>;

    /// There is a live inferior.
    fn has_execution(&self) -> bool;

    /// The target can report events asynchronously through the loop.
    fn can_async(&self) -> bool;

    /// Registers (`true`) or unregisters (`false`) the target's descriptors with the
    /// loop.
    ///
    /// # Errors
    ///
    /// Any failure (un)registering.
    fn set_async(&self, event_loop: &mut EventLoop, enable: bool) -> EventLoopResult<()>;
}
