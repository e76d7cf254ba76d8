// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use std::{cell::RefCell,
          io::{Result, Write},
          rc::Rc};

/// In-memory console output. Clones share the same buffer, so one copy can be handed to
/// a [`Ui`] while the test keeps another to inspect what was written.
///
/// [`Ui`]: crate::Ui
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    buffer: Rc<RefCell<Vec<u8>>>,
}

impl CapturedOutput {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Everything written so far, lossily decoded.
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.borrow()).into_owned()
    }

    pub fn clear(&self) { self.buffer.borrow_mut().clear(); }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.buffer.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> { Ok(()) }
}
