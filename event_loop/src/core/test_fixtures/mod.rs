// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// Attach sources.
pub mod captured_output;
pub mod socket_pair_fixtures;

// Re-export.
pub use captured_output::*;
pub use socket_pair_fixtures::*;
