// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// Attach sources.
pub mod continuations;
pub mod inferior_event_handler;
pub mod target;

// Re-export.
pub use continuations::*;
pub use inferior_event_handler::*;
pub use target::*;
