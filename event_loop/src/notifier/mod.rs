// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// Attach sources.
pub mod fd_interest;
pub mod file_handler_registry;
pub mod file_notifier;
pub mod mio_backend;
pub mod poll_backend;

// Re-export.
pub use fd_interest::*;
pub use file_handler_registry::*;
pub use file_notifier::*;
pub use mio_backend::*;
pub use poll_backend::*;
