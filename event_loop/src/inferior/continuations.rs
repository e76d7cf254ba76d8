// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Work deferred until a resumption of the inferior finishes.
//!
//! | Queue                  | Runs on                          | Order |
//! | :--------------------- | :------------------------------- | :---- |
//! | Intermediate, per thread | `ExecContinue`, `ExecComplete` | 1st   |
//! | Whole inferior         | `ExecComplete`                   | 2nd   |
//! | Breakpoint commands    | `ExecComplete`                   | last  |
//!
//! Breakpoint commands may resume the inferior themselves, so they always go last.
//! Each queue is detached before it runs: a continuation that queues another one
//! schedules it for the *next* stop, not this one.

use crate::{EventLoop, EventLoopResult};
use std::{collections::BTreeMap,
          fmt::{Display, Formatter}};

pub type ContinuationFn = Box<dyn FnOnce(&mut EventLoop) -> EventLoopResult<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub u64);

impl Display for ThreadId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "thread {}", self.0)
    }
}

#[allow(missing_debug_implementations)]
#[derive(Default)]
pub struct ContinuationQueues {
    intermediate: BTreeMap<ThreadId, Vec<ContinuationFn>>,
    inferior: Vec<ContinuationFn>,
    breakpoint_commands: Vec<ContinuationFn>,
}

impl ContinuationQueues {
    pub fn add_intermediate(&mut self, thread: ThreadId, it: ContinuationFn) {
        self.intermediate.entry(thread).or_default().push(it);
    }

    pub fn add_inferior(&mut self, it: ContinuationFn) { self.inferior.push(it); }

    pub fn add_breakpoint_command(&mut self, it: ContinuationFn) {
        self.breakpoint_commands.push(it);
    }

    /// Every thread's intermediate continuations, threads in id order.
    pub fn take_intermediate(&mut self) -> Vec<ContinuationFn> {
        std::mem::take(&mut self.intermediate)
            .into_values()
            .flatten()
            .collect()
    }

    pub fn take_inferior(&mut self) -> Vec<ContinuationFn> { std::mem::take(&mut self.inferior) }

    pub fn take_breakpoint_commands(&mut self) -> Vec<ContinuationFn> {
        std::mem::take(&mut self.breakpoint_commands)
    }

    /// Drops the intermediate and whole-inferior queues without running them.
    pub fn discard_all(&mut self) {
        self.intermediate.clear();
        self.inferior.clear();
    }

    /// Rolls back breakpoint actions that were queued but not run.
    pub fn clear_breakpoint_actions(&mut self) { self.breakpoint_commands.clear(); }

    #[must_use]
    pub fn pending_counts(&self) -> (usize, usize, usize) {
        (
            self.intermediate.values().map(Vec::len).sum(),
            self.inferior.len(),
            self.breakpoint_commands.len(),
        )
    }
}

/// Runs `queue` in order. On the first error the remaining continuations are dropped.
///
/// # Errors
///
/// The first error a continuation returns.
pub fn run_continuations(
    event_loop: &mut EventLoop,
    queue: Vec<ContinuationFn>,
) -> EventLoopResult<()> {
    for continuation in queue {
        continuation(event_loop)?;
    }
    Ok(())
}
