// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words reentrant

//! Connects consoles to the loop: input descriptors go through the file notifier,
//! bytes go through each console's [`LineAssembler`], and complete lines go to the
//! console's input handler, one at a time.
//!
//! # Delivery
//!
//! Lines are queued per console and delivered in order, but only while the console is
//! not [`PromptState::Blocked`]. A command that blocks its console (a foreground
//! operation) leaves the remaining lines queued. [`enable_console_input()`] marks the
//! console's pending-input async event handler, which delivers them on a later turn of
//! the loop.
//!
//! # Secondary prompt
//!
//! [`read_secondary_line()`] asks a question from *inside* a running command. It swaps
//! the console's input handler for one that captures a single line, then runs the loop
//! reentrantly with [`run_until()`] until that line (or end of file) shows up.
//!
//! [`LineAssembler`]: super::LineAssembler
//! [`enable_console_input()`]: EventLoop::enable_console_input
//! [`read_secondary_line()`]: EventLoop::read_secondary_line
//! [`run_until()`]: EventLoop::run_until

use super::{InputHandlerFn, PromptState, Ui, UiId};
use crate::{DEBUG_EVENT_LOOP, EventLoop, EventLoopError, EventLoopResult, FileHandlerEvent,
            RunUntilOutcome};
use std::{cell::RefCell,
          io::{ErrorKind, Read as _, Write as _},
          rc::Rc};

impl EventLoop {
    /// Registers a console and enables its input. The first console added becomes the
    /// main console.
    ///
    /// # Errors
    ///
    /// Never in practice; the id is looked up right after it is inserted.
    pub fn add_ui(&mut self, ui: Ui) -> EventLoopResult<UiId> {
        let id = self.uis.insert(ui);
        let handler_id =
            self.create_async_event_handler(move |event_loop| event_loop.deliver_pending_input(id));
        self.ui_mut(id)?.pending_input_handler = Some(handler_id);
        self.enable_console_input(id)?;
        DEBUG_EVENT_LOOP.then(|| {
            tracing::debug!(message = "console added", ui = %id);
        });
        Ok(id)
    }

    /// Stops monitoring the console's input and forgets it. Returns `None` if `id` is
    /// unknown.
    pub fn remove_ui(&mut self, id: UiId) -> Option<Ui> {
        let mut ui = self.uis.remove(id)?;
        if !ui.input_closed {
            self.delete_file_handler(ui.input_fd());
        }
        if let Some(handler_id) = ui.pending_input_handler.take() {
            self.delete_async_event_handler(handler_id);
        }
        DEBUG_EVENT_LOOP.then(|| {
            tracing::debug!(message = "console removed", ui = %id);
        });
        Some(ui)
    }

    /// `Blocked → Needed`: monitors the console's input again and schedules delivery
    /// of lines that were read while it was blocked. No-op in any other state.
    ///
    /// # Errors
    ///
    /// [`EventLoopError::UnknownConsole`].
    pub fn enable_console_input(&mut self, id: UiId) -> EventLoopResult<()> {
        let ui = self.ui_mut(id)?;
        if ui.prompt_state != PromptState::Blocked {
            return Ok(());
        }
        ui.prompt_state = PromptState::Needed;
        if !ui.input_closed {
            let fd = ui.input_fd();
            self.add_file_handler(fd, move |event_loop, event| {
                console_input_handler(event_loop, id, event)
            });
        }
        self.schedule_pending_input(id);
        Ok(())
    }

    /// `any → Blocked`: a foreground operation owns the console. Its input is no longer
    /// monitored, so it can't wake the loop.
    ///
    /// # Errors
    ///
    /// [`EventLoopError::UnknownConsole`].
    pub fn disable_console_input(&mut self, id: UiId) -> EventLoopResult<()> {
        let ui = self.ui_mut(id)?;
        ui.prompt_state = PromptState::Blocked;
        let fd = ui.input_fd();
        self.delete_file_handler(fd);
        Ok(())
    }

    /// Shows `prompt`, or the console's own prompt when `None`.
    ///
    /// While the console is blocked, nothing is shown unless a prompt is given
    /// explicitly (the state stays blocked). Otherwise the state becomes
    /// [`PromptState::Prompted`].
    ///
    /// # Errors
    ///
    /// [`EventLoopError::UnknownConsole`], or [`EventLoopError::ConsoleOutput`] if the
    /// output stream fails.
    pub fn display_prompt(&mut self, id: UiId, prompt: Option<&str>) -> EventLoopResult<()> {
        let ui = self.ui_mut(id)?;
        if ui.prompt_state == PromptState::Blocked && prompt.is_none() {
            return Ok(());
        }
        let text = prompt.map_or_else(|| ui.prompt.clone(), str::to_string);
        ui.output
            .write_all(text.as_bytes())
            .and_then(|()| ui.output.flush())
            .map_err(EventLoopError::ConsoleOutput)?;
        if ui.prompt_state != PromptState::Blocked {
            ui.prompt_state = PromptState::Prompted;
        }
        Ok(())
    }

    /// Writes `text` to the console's output and flushes it.
    ///
    /// # Errors
    ///
    /// [`EventLoopError::UnknownConsole`], or [`EventLoopError::ConsoleOutput`].
    pub fn write_to_console(&mut self, id: UiId, text: &str) -> EventLoopResult<()> {
        let ui = self.ui_mut(id)?;
        ui.output
            .write_all(text.as_bytes())
            .and_then(|()| ui.output.flush())
            .map_err(|err| EventLoopError::ConsoleOutput(err).into())
    }

    /// Hands `command` to the console's dispatcher, with that console current.
    ///
    /// # Errors
    ///
    /// Whatever the dispatcher returns.
    pub fn dispatch_command(&mut self, id: UiId, command: &str) -> EventLoopResult<()> {
        let dispatch = Rc::clone(&self.ui_mut(id)?.dispatch);
        DEBUG_EVENT_LOOP.then(|| {
            tracing::debug!(message = "dispatching command", ui = %id, command);
        });
        self.with_current_ui(Some(id), |event_loop| dispatch(event_loop, id, command))
    }

    /// Replaces the console's input handler, returning the old one.
    ///
    /// # Errors
    ///
    /// [`EventLoopError::UnknownConsole`].
    pub fn set_input_handler(
        &mut self,
        id: UiId,
        handler: impl Fn(&mut EventLoop, UiId, Option<String>) -> EventLoopResult<()> + 'static,
    ) -> EventLoopResult<InputHandlerFn> {
        Ok(self.ui_mut(id)?.replace_input_handler(Rc::new(handler)))
    }

    /// Delivers queued lines to the console's input handler until the queue is empty,
    /// the console blocks, or the console goes away.
    ///
    /// Inside a secondary prompt only one line is delivered: it answers the question,
    /// and the rest wait for the next turn of the loop.
    ///
    /// # Errors
    ///
    /// Whatever the input handler returns. Undelivered lines stay queued.
    pub fn deliver_pending_input(&mut self, id: UiId) -> EventLoopResult<()> {
        loop {
            let Some(ui) = self.uis.get_mut(id) else {
                return Ok(());
            };
            if ui.prompt_state == PromptState::Blocked {
                return Ok(());
            }
            let Some(line) = ui.pending_input.pop_front() else {
                return Ok(());
            };
            let answering_secondary_prompt = ui.secondary_prompt_depth > 0;
            let handler = Rc::clone(&ui.input_handler);

            handler(self, id, line)?;

            if answering_secondary_prompt {
                self.schedule_pending_input(id);
                return Ok(());
            }
        }
    }

    /// Asks `prompt` on the console and waits (running the loop) for the answer.
    /// Returns `None` at end of file, or if the loop runs out of event sources.
    ///
    /// The console's input handler and prompt state are restored afterwards, on every
    /// exit path. A console that was blocked has its input enabled for the duration of
    /// the question.
    ///
    /// # Errors
    ///
    /// [`EventLoopError::UnknownConsole`], or any error escaping a nested iteration of
    /// the loop.
    pub fn read_secondary_line(
        &mut self,
        id: UiId,
        prompt: &str,
    ) -> EventLoopResult<Option<String>> {
        let answer: Rc<RefCell<Option<Option<String>>>> = Rc::default();
        let capture: InputHandlerFn = {
            let answer = Rc::clone(&answer);
            Rc::new(move |_, _, line| {
                *answer.borrow_mut() = Some(line);
                Ok(())
            })
        };

        let ui = self.ui_mut(id)?;
        let saved_handler = ui.replace_input_handler(capture);
        let saved_state = ui.prompt_state;
        ui.secondary_prompt_depth += 1;

        let result = self.ask_secondary_prompt(id, prompt, &answer);

        if let Some(ui) = self.uis.get_mut(id) {
            ui.input_handler = saved_handler;
            ui.secondary_prompt_depth -= 1;
            if saved_state == PromptState::Blocked {
                self.disable_console_input(id)?;
            } else {
                ui.prompt_state = saved_state;
            }
        }

        match result? {
            RunUntilOutcome::Satisfied => Ok(answer.borrow_mut().take().flatten()),
            RunUntilOutcome::NoSources => Ok(None),
        }
    }

    fn ask_secondary_prompt(
        &mut self,
        id: UiId,
        prompt: &str,
        answer: &Rc<RefCell<Option<Option<String>>>>,
    ) -> EventLoopResult<RunUntilOutcome> {
        if self.ui_mut(id)?.prompt_state == PromptState::Blocked {
            self.enable_console_input(id)?;
        } else {
            self.ui_mut(id)?.prompt_state = PromptState::Needed;
            self.schedule_pending_input(id);
        }
        self.display_prompt(id, Some(prompt))?;
        self.run_until(|_| answer.borrow().is_some())
    }

    /// Marks the console's pending-input handler if it has queued lines.
    fn schedule_pending_input(&mut self, id: UiId) {
        let Some(ui) = self.uis.get(id) else { return };
        if let (true, Some(handler_id)) = (ui.has_pending_input(), ui.pending_input_handler) {
            self.mark_async_event_handler(handler_id);
        }
    }
}

/// File handler for a console's input descriptor.
///
/// - Error condition: main becomes current and the descriptor is dropped. On the main
///   console that means end of file (an implicit `quit`); any other console is
///   removed.
/// - End of file: a trailing partial line is delivered as a line, then `None`.
/// - Otherwise one chunk is read and every line it completes is queued and delivered.
fn console_input_handler(
    event_loop: &mut EventLoop,
    id: UiId,
    event: FileHandlerEvent,
) -> EventLoopResult<()> {
    if event.error {
        tracing::warn!(message = "error condition on console input", ui = %id, fd = event.fd);
        let main = event_loop.main_ui();
        event_loop.uis.set_current(main);
        event_loop.delete_file_handler(event.fd);
        if main != Some(id) {
            event_loop.remove_ui(id);
            return Ok(());
        }
        event_loop.write_to_console(id, "error detected on console input\n")?;
        let ui = event_loop.ui_mut(id)?;
        ui.input_closed = true;
        ui.pending_input.push_back(None);
        return event_loop.deliver_pending_input(id);
    }

    event_loop.uis.set_current(Some(id));
    let mut buffer = vec![0_u8; event_loop.config.read_buffer_size.max(1)];
    let ui = event_loop.ui_mut(id)?;
    match ui.input.read(&mut buffer) {
        Ok(0) => {
            ui.input_closed = true;
            if let Some(partial) = ui.line_assembler.take_partial() {
                ui.pending_input.push_back(Some(partial));
            }
            ui.pending_input.push_back(None);
            event_loop.delete_file_handler(event.fd);
        }
        Ok(count) => {
            let lines = ui.line_assembler.push_bytes(&buffer[..count]);
            ui.pending_input.extend(lines.into_iter().map(Some));
        }
        Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
            return Ok(());
        }
        Err(err) => return Err(EventLoopError::ConsoleInput(err).into()),
    }
    event_loop.deliver_pending_input(id)
}
