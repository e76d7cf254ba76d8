// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words EINTR reentrant

//! Driving the loop.
//!
//! # One iteration ([`do_one_event()`])
//!
//! 1. Run every ready async signal handler. If any ran, that's the iteration.
//! 2. Walk the fairness rotation {timers, file descriptors, async event handlers}
//!    starting at the cursor, doing a non-blocking check of each. The cursor moves one
//!    step per check whatever the outcome. The first check that does work ends the
//!    iteration.
//! 3. Nothing was ready: block once in [`wait_for_event()`] (bounded by the nearest
//!    timer deadline). If there is nothing left to wait on, report
//!    [`OneEventOutcome::NoSources`].
//!
//! The notifier has its own round-robin cursor over descriptors. The two cursors are
//! independent.
//!
//! # Errors
//!
//! A callback error propagates out of [`do_one_event()`]. [`start_event_loop()`]
//! catches it, reports it, re-enables input on every console and redisplays the
//! prompt, then keeps going.
//!
//! [`do_one_event()`]: EventLoop::do_one_event
//! [`start_event_loop()`]: EventLoop::start_event_loop
//! [`wait_for_event()`]: EventLoop::wait_for_event

use super::EventSource;
use crate::{DEBUG_EVENT_LOOP, EventLoop, EventLoopError, EventLoopResult, NotifierWait,
            PromptState};
use std::{io::Write as _, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneEventOutcome {
    Progressed,
    /// No descriptors, no timers, nothing pending: the loop has nothing left to do.
    NoSources,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitForEventOutcome {
    NoSources,
    /// Nothing became ready before the timeout, or a signal interrupted the wait.
    TimedOut,
    /// A descriptor's callback ran, or the async signal wake pipe was readable.
    Handled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunUntilOutcome {
    Satisfied,
    NoSources,
}

impl EventLoop {
    /// Runs every marked async signal handler, with the main console current. Loops
    /// until none is marked, since signals can arrive while handlers run.
    ///
    /// # Errors
    ///
    /// The first error a handler returns. Handlers still marked run on the next call.
    pub fn invoke_async_signal_handlers(&mut self) -> EventLoopResult<bool> {
        if self.signal_handlers.is_empty() {
            return Ok(false);
        }
        // Drain first: a mark landing after this point leaves a byte for the next wait.
        self.signal_handlers.clear_wake();

        let mut any_ran = false;
        while let Some((id, callback)) = self.signal_handlers.take_next_ready() {
            any_ran = true;
            DEBUG_EVENT_LOOP.then(|| {
                tracing::debug!(message = "running async signal handler", handler = %id);
            });
            let main = self.uis.main();
            self.with_current_ui(main, |event_loop| callback(event_loop))?;
        }
        Ok(any_ran)
    }

    /// Runs at most one marked async event handler.
    ///
    /// # Errors
    ///
    /// Whatever the handler returns.
    pub fn check_async_event_handlers(&mut self) -> EventLoopResult<bool> {
        let Some((id, callback)) = self.event_handlers.take_next_ready() else {
            return Ok(false);
        };
        DEBUG_EVENT_LOOP.then(|| {
            tracing::debug!(message = "running async event handler", handler = %id);
        });
        callback(self)?;
        Ok(true)
    }

    /// Flushes output, waits for readiness, and runs the callback of exactly one ready
    /// descriptor.
    ///
    /// - `blocking`: waits until the nearest timer deadline (forever if there is no
    ///   timer). With no descriptors to wait on, sleeps until that deadline instead
    ///   (through [`Clock::sleep()`], so a manual clock just moves forward), or returns [`WaitForEventOutcome::NoSources`] if there is no timer either.
    /// - Not `blocking`: only looks.
    ///
    /// # Errors
    ///
    /// [`EventLoopError::WaitForEvent`] if the wait itself fails (`EINTR` is not a
    /// failure), or whatever the descriptor's callback returns.
    pub fn wait_for_event(&mut self, blocking: bool) -> EventLoopResult<WaitForEventOutcome> {
        self.flush_all_output();

        if self.notifier.source_count() == 0 {
            let next_deadline = self.timers.time_until_next(self.clock.now());
            return Ok(match next_deadline {
                Some(delay) if blocking => {
                    self.clock.sleep(delay);
                    WaitForEventOutcome::TimedOut
                }
                _ => WaitForEventOutcome::NoSources,
            });
        }

        let timeout = if blocking {
            self.timers.time_until_next(self.clock.now())
        } else {
            Some(Duration::ZERO)
        };

        match self
            .notifier
            .wait(timeout)
            .map_err(EventLoopError::WaitForEvent)?
        {
            NotifierWait::TimedOut | NotifierWait::Interrupted => {
                Ok(WaitForEventOutcome::TimedOut)
            }
            NotifierWait::Wake => Ok(WaitForEventOutcome::Handled),
            NotifierWait::Ready(selected) => {
                (selected.callback)(self, selected.event)?;
                Ok(WaitForEventOutcome::Handled)
            }
        }
    }

    /// Runs exactly one unit of work, blocking only if nothing is ready.
    ///
    /// # Errors
    ///
    /// Any error a callback returns, or a failed readiness wait.
    pub fn do_one_event(&mut self) -> EventLoopResult<OneEventOutcome> {
        if self.invoke_async_signal_handlers()? {
            return Ok(OneEventOutcome::Progressed);
        }

        for _ in 0..EventSource::COUNT {
            let source = self.next_event_source;
            self.next_event_source = source.next();
            let progressed = match source {
                EventSource::Timers => self.poll_timers()?,
                EventSource::FileDescriptors => {
                    self.wait_for_event(false)? == WaitForEventOutcome::Handled
                }
                EventSource::AsyncEventHandlers => self.check_async_event_handlers()?,
            };
            if progressed {
                return Ok(OneEventOutcome::Progressed);
            }
        }

        Ok(match self.wait_for_event(true)? {
            WaitForEventOutcome::NoSources => OneEventOutcome::NoSources,
            WaitForEventOutcome::TimedOut | WaitForEventOutcome::Handled => {
                OneEventOutcome::Progressed
            }
        })
    }

    /// Runs iterations until there are no event sources left. Errors escaping an
    /// iteration are reported on the current console and the loop carries on.
    pub fn start_event_loop(&mut self) {
        loop {
            match self.do_one_event() {
                Ok(OneEventOutcome::NoSources) => break,
                Ok(OneEventOutcome::Progressed) => {}
                Err(report) => self.recover_from_error(&report),
            }
        }
        DEBUG_EVENT_LOOP.then(|| {
            tracing::debug!(message = "event loop has no sources left");
        });
    }

    /// Runs iterations until `predicate` holds. This is how code running *inside* a
    /// callback waits for something (eg: an answer to a secondary prompt) without
    /// returning to the outer loop.
    ///
    /// # Errors
    ///
    /// The first error escaping an iteration. Unlike [`start_event_loop()`], nothing is
    /// recovered here; the caller decides.
    ///
    /// [`start_event_loop()`]: Self::start_event_loop
    pub fn run_until(
        &mut self,
        mut predicate: impl FnMut(&EventLoop) -> bool,
    ) -> EventLoopResult<RunUntilOutcome> {
        loop {
            if predicate(self) {
                return Ok(RunUntilOutcome::Satisfied);
            }
            if self.do_one_event()? == OneEventOutcome::NoSources {
                return Ok(RunUntilOutcome::NoSources);
            }
        }
    }

    /// Reports `report`, then makes sure no console is left blocked by a command that
    /// failed halfway.
    fn recover_from_error(&mut self, report: &miette::Report) {
        tracing::error!(message = "error escaped an event loop iteration", error = ?report);

        let text = format!("{report:?}\n");
        let current = self.uis.current();
        let printed = current.is_some_and(|id| self.write_to_console(id, &text).is_ok());
        if !printed {
            drop(std::io::stderr().write_all(text.as_bytes()));
        }

        let enabled = self.switch_thru_all_uis(|event_loop, id| event_loop.enable_console_input(id));
        if let Err(err) = enabled {
            tracing::error!(message = "re-enabling console input failed", error = ?err);
        }

        if let Some(id) = current
            && let Ok(ui) = self.ui_mut(id)
        {
            ui.set_prompt_state(PromptState::Needed);
            if let Err(err) = self.display_prompt(id, None) {
                tracing::error!(message = "redisplaying the prompt failed", error = ?err);
            }
        }
    }

    /// Output written by callbacks shows up before the loop blocks.
    fn flush_all_output(&mut self) {
        drop(std::io::stdout().flush());
        drop(std::io::stderr().flush());
        for ui in self.uis.iter_mut() {
            if let Err(err) = ui.output.flush() {
                DEBUG_EVENT_LOOP.then(|| {
                    tracing::debug!(message = "flushing console output failed", error = %err);
                });
            }
        }
    }
}
