// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// Attach sources.
pub mod async_event_handler;
pub mod async_signal_handler;
pub mod wake_pipe;

// Re-export.
pub use async_event_handler::*;
pub use async_signal_handler::*;
pub use wake_pipe::*;
