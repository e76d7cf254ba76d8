// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// Attach sources.
pub mod clock;
pub mod common;
pub mod config;
pub mod log;
pub mod test_fixtures;

// Re-export.
pub use clock::*;
pub use common::*;
pub use config::*;
pub use log::*;
pub use test_fixtures::*;
