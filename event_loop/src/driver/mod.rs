// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// Attach sources.
pub mod event_loop;
pub mod event_loop_driver;
pub mod registration;

#[cfg(test)]
mod integration_tests;

// Re-export.
pub use event_loop::*;
pub use event_loop_driver::*;
