// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! One logical console: an input descriptor, an output stream, a prompt, and the state
//! that turns bytes into commands.

use super::{CommandLineState, LineAssembler, PromptState, command_line_handler};
use crate::{AsyncEventHandlerId, EventLoop, EventLoopResult};
use std::{collections::VecDeque,
          fmt::{Debug, Display, Formatter},
          io::{Read, Write},
          os::fd::{AsRawFd, RawFd},
          rc::Rc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UiId(pub u64);

impl Display for UiId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "ui{}", self.0) }
}

/// Anything a console can read from: a terminal, a pipe, a socket.
pub trait ConsoleInput: Read + AsRawFd {}

impl<T: Read + AsRawFd> ConsoleInput for T {}

/// Receives each complete input line, or `None` at end of file.
pub type InputHandlerFn = Rc<dyn Fn(&mut EventLoop, UiId, Option<String>) -> EventLoopResult<()>>;

/// Executes one command line. Parsing and command semantics live here, outside the
/// loop.
pub type CommandDispatchFn = Rc<dyn Fn(&mut EventLoop, UiId, &str) -> EventLoopResult<()>>;

pub const DEFAULT_PROMPT: &str = "(evl) ";

pub struct Ui {
    pub(crate) input: Box<dyn ConsoleInput>,
    pub(crate) output: Box<dyn Write>,
    pub(crate) prompt: String,
    pub(crate) prompt_state: PromptState,
    pub(crate) line_assembler: LineAssembler,
    pub(crate) command_line_state: CommandLineState,
    /// Complete lines read but not yet delivered. `None` is end of file.
    pub(crate) pending_input: VecDeque<Option<String>>,
    pub(crate) input_handler: InputHandlerFn,
    pub(crate) dispatch: CommandDispatchFn,
    /// Delivers `pending_input` once input is re-enabled.
    pub(crate) pending_input_handler: Option<AsyncEventHandlerId>,
    /// End of file was read. The descriptor is never monitored again.
    pub(crate) input_closed: bool,
    pub(crate) secondary_prompt_depth: usize,
}

impl Debug for Ui {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ui")
            .field("input_fd", &self.input.as_raw_fd())
            .field("prompt", &self.prompt)
            .field("prompt_state", &self.prompt_state)
            .field("pending_input", &self.pending_input)
            .field("input_closed", &self.input_closed)
            .finish_non_exhaustive()
    }
}

impl Ui {
    /// A console with the default prompt, command editing and repeat on blank turned
    /// on, and [`command_line_handler()`] as its input handler. It starts
    /// [`PromptState::Blocked`] until [`EventLoop::add_ui()`] enables its input.
    pub fn new(
        input: impl ConsoleInput + 'static,
        output: impl Write + 'static,
        dispatch: impl Fn(&mut EventLoop, UiId, &str) -> EventLoopResult<()> + 'static,
    ) -> Self {
        Self {
            input: Box::new(input),
            output: Box::new(output),
            prompt: DEFAULT_PROMPT.to_string(),
            prompt_state: PromptState::Blocked,
            line_assembler: LineAssembler::new(true),
            command_line_state: CommandLineState::new(true),
            pending_input: VecDeque::new(),
            input_handler: Rc::new(command_line_handler),
            dispatch: Rc::new(dispatch),
            pending_input_handler: None,
            input_closed: false,
            secondary_prompt_depth: 0,
        }
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    #[must_use]
    pub fn with_command_editing(mut self, it: bool) -> Self {
        self.line_assembler.set_command_editing(it);
        self
    }

    #[must_use]
    pub fn with_repeat_on_blank(mut self, it: bool) -> Self {
        self.command_line_state = CommandLineState::new(it);
        self
    }

    #[must_use]
    pub fn input_fd(&self) -> RawFd { self.input.as_raw_fd() }

    #[must_use]
    pub fn prompt(&self) -> &str { &self.prompt }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) { self.prompt = prompt.into(); }

    #[must_use]
    pub fn prompt_state(&self) -> PromptState { self.prompt_state }

    pub fn set_prompt_state(&mut self, it: PromptState) { self.prompt_state = it; }

    #[must_use]
    pub fn command_editing(&self) -> bool { self.line_assembler.command_editing() }

    pub fn set_command_editing(&mut self, it: bool) {
        self.line_assembler.set_command_editing(it);
    }

    #[must_use]
    pub fn command_line_state(&self) -> &CommandLineState { &self.command_line_state }

    pub fn command_line_state_mut(&mut self) -> &mut CommandLineState {
        &mut self.command_line_state
    }

    /// Replaces the line handler, returning the old one.
    pub fn replace_input_handler(&mut self, handler: InputHandlerFn) -> InputHandlerFn {
        std::mem::replace(&mut self.input_handler, handler)
    }

    #[must_use]
    pub fn has_pending_input(&self) -> bool { !self.pending_input.is_empty() }

    #[must_use]
    pub fn input_closed(&self) -> bool { self.input_closed }
}
