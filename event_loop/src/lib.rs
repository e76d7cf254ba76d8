// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words epoll kqueue reentrant

//! # Cooperative event loop
//!
//! A single-threaded, reactor-style scheduler that multiplexes three heterogeneous event
//! sources, plus a strict-priority fourth one:
//!
//! | Source                      | Module               | Unit of work per iteration          |
//! | :-------------------------- | :------------------- | :---------------------------------- |
//! | Async signal handlers       | [`async_handlers`]   | Drain **all** ready (priority)      |
//! | Timers                      | [`timer`]            | At most one expired timer           |
//! | File descriptors            | [`notifier`]         | Exactly one ready descriptor        |
//! | Async event handlers        | [`async_handlers`]   | At most one ready handler           |
//!
//! The [`EventLoop`] owns every registry. Callbacks receive `&mut EventLoop`, so they can
//! register, mark, and delete sources (including themselves) while they run. Nothing in
//! the loop is shared between threads. The single exception is the `ready` flag of an
//! async signal handler, which an OS signal handler sets through an
//! [`AsyncSignalMarker`].
//!
//! ```text
//! OS readiness ──▶ registry marks pending work ──▶ do_one_event() runs one unit ──▶ side effects
//!   signals          (ready flag + wake pipe)        (signals first, then the
//!   fd readiness     (notifier readiness)             timers → fds → events
//!   deadlines        (sorted timer queue)             rotation, then block)
//! ```
//!
//! On top of the loop sit two bridges:
//! - The [`console`] bridge: consoles (UIs), prompt state, line assembly, repeat of the
//!   previous command, and a reentrant secondary prompt built on
//!   [`EventLoop::run_until()`].
//! - The [`inferior`] bridge: translates target events into continuation execution with
//!   a fixed ordering.
//!
//! # Entry points
//!
//! - [`EventLoop::do_one_event()`] runs exactly one unit of work (or blocks once).
//! - [`EventLoop::start_event_loop()`] runs until there are no event sources left,
//!   reporting (and recovering from) errors escaping a single iteration.

// Enforce strict error handling in production library code only. Tests are allowed to use
// .unwrap() (workspace `Cargo.toml` config allows it).
#![cfg_attr(not(test), deny(clippy::unwrap_in_result))]

// Attach modules (re-exported below to provide clean public API).
pub mod async_handlers;
pub mod console;
pub mod core;
pub mod driver;
pub mod inferior;
pub mod notifier;
pub mod timer;

// Re-export.
pub use async_handlers::*;
pub use console::*;
pub use crate::core::*;
pub use driver::*;
pub use inferior::*;
pub use notifier::*;
pub use timer::*;
