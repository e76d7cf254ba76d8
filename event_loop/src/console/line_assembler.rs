// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Turns raw console input chunks into complete lines.
//!
//! A chunk may hold part of a line, exactly one line, or several. Bytes after the last
//! newline stay buffered until the next chunk (or end of file) completes them.
//!
//! | Mode          | Control bytes                                              |
//! | :------------ | :--------------------------------------------------------- |
//! | Editing       | `BS` / `DEL` erase one character, `^U` erases the line     |
//! | Plain         | Passed through untouched                                   |
//!
//! In both modes a `\r` right before the `\n` is dropped.

const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7f;
const KILL_LINE: u8 = 0x15;

#[derive(Debug, Clone, Default)]
pub struct LineAssembler {
    buffer: Vec<u8>,
    command_editing: bool,
}

impl LineAssembler {
    #[must_use]
    pub fn new(command_editing: bool) -> Self {
        Self {
            buffer: Vec::new(),
            command_editing,
        }
    }

    #[must_use]
    pub fn command_editing(&self) -> bool { self.command_editing }

    pub fn set_command_editing(&mut self, it: bool) { self.command_editing = it; }

    /// Appends `chunk`, returning every line it completed (without the newline).
    pub fn push_bytes(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = vec![];
        for &byte in chunk {
            match byte {
                b'\n' => {
                    if self.buffer.last() == Some(&b'\r') {
                        self.buffer.pop();
                    }
                    lines.push(String::from_utf8_lossy(&self.buffer).into_owned());
                    self.buffer.clear();
                }
                BACKSPACE | DELETE if self.command_editing => self.erase_char(),
                KILL_LINE if self.command_editing => self.buffer.clear(),
                _ => self.buffer.push(byte),
            }
        }
        lines
    }

    #[must_use]
    pub fn has_partial(&self) -> bool { !self.buffer.is_empty() }

    /// Hands out whatever is buffered without a newline (used at end of file).
    pub fn take_partial(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let partial = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        Some(partial)
    }

    /// Removes one whole UTF-8 character.
    fn erase_char(&mut self) {
        while let Some(byte) = self.buffer.pop() {
            let is_continuation_byte = byte & 0b1100_0000 == 0b1000_0000;
            if !is_continuation_byte {
                break;
            }
        }
    }
}
