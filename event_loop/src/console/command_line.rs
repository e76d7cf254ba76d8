// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! From input lines to commands: continuation lines, repeat on blank, comments, and the
//! default input handler every console starts with.

use crate::{EventLoop, EventLoopResult, PromptState, UiId};

/// Marks a line as continued on the next one.
pub const CONTINUATION_MARKER: char = '\\';

/// What [`CommandLineState::accept()`] made of one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// The line ended with [`CONTINUATION_MARKER`]; keep reading.
    Incomplete,
    Execute(String),
    /// A blank line with nothing to repeat.
    Blank,
}

/// Per-console state that outlives a single line.
#[derive(Debug, Clone, Default)]
pub struct CommandLineState {
    continuation: String,
    saved_command: Option<String>,
    repeat_on_blank: bool,
}

impl CommandLineState {
    #[must_use]
    pub fn new(repeat_on_blank: bool) -> Self {
        Self {
            repeat_on_blank,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn saved_command(&self) -> Option<&str> { self.saved_command.as_deref() }

    #[must_use]
    pub fn is_continuing(&self) -> bool { !self.continuation.is_empty() }

    pub fn accept(&mut self, line: &str) -> CommandLine {
        if let Some(head) = line.strip_suffix(CONTINUATION_MARKER) {
            self.continuation.push_str(head);
            return CommandLine::Incomplete;
        }

        let mut command = std::mem::take(&mut self.continuation);
        command.push_str(line);

        if command.trim().is_empty() {
            return match &self.saved_command {
                Some(saved) if self.repeat_on_blank => CommandLine::Execute(saved.clone()),
                _ => CommandLine::Blank,
            };
        }

        if !is_comment(&command) {
            self.saved_command = Some(command.clone());
        }
        CommandLine::Execute(command)
    }
}

#[must_use]
pub fn is_comment(line: &str) -> bool { line.trim_start().starts_with('#') }

/// The input handler a console starts with.
///
/// - `None` (end of file): echo `quit` and run it.
/// - A continued line: show an empty prompt and wait for the rest.
/// - A complete line: run it, then show the prompt unless the command already did.
///
/// # Errors
///
/// Whatever the console's command dispatcher returns.
pub fn command_line_handler(
    event_loop: &mut EventLoop,
    ui_id: UiId,
    line: Option<String>,
) -> EventLoopResult<()> {
    let Some(line) = line else {
        event_loop.write_to_console(ui_id, "quit\n")?;
        return event_loop.dispatch_command(ui_id, "quit");
    };

    let command = event_loop.ui_mut(ui_id)?.command_line_state_mut().accept(&line);
    match command {
        CommandLine::Incomplete => event_loop.display_prompt(ui_id, Some("")),
        CommandLine::Blank => {
            event_loop.ui_mut(ui_id)?.set_prompt_state(PromptState::Needed);
            event_loop.display_prompt(ui_id, None)
        }
        CommandLine::Execute(command) => {
            event_loop.ui_mut(ui_id)?.set_prompt_state(PromptState::Needed);
            event_loop.dispatch_command(ui_id, &command)?;
            // The command may have removed its own console.
            match event_loop.ui(ui_id) {
                Some(ui) if ui.prompt_state() != PromptState::Prompted => {
                    event_loop.display_prompt(ui_id, None)
                }
                _ => Ok(()),
            }
        }
    }
}
