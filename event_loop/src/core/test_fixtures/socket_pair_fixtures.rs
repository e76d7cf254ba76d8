// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use std::{io::{Result, Write as _},
          os::{fd::{AsRawFd as _, RawFd},
               unix::net::UnixStream}};

/// A connected pair of non-blocking Unix sockets. The `reader` end is what gets
/// registered with the loop; the test drives it by writing into `writer`.
#[derive(Debug)]
pub struct SocketPair {
    pub reader: UnixStream,
    pub writer: UnixStream,
}

impl SocketPair {
    /// # Errors
    ///
    /// Returns an error if the OS can't create the socket pair.
    pub fn new() -> Result<Self> {
        let (reader, writer) = UnixStream::pair()?;
        reader.set_nonblocking(true)?;
        Ok(Self { reader, writer })
    }

    /// A pair whose `reader` is readable right away, and stays readable because nothing
    /// ever drains it.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS can't create or write to the socket pair.
    pub fn always_ready() -> Result<Self> {
        let mut it = Self::new()?;
        it.writer.write_all(b"x")?;
        Ok(it)
    }

    #[must_use]
    pub fn reader_fd(&self) -> RawFd { self.reader.as_raw_fd() }

    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn send(&mut self, bytes: &str) -> Result<()> {
        self.writer.write_all(bytes.as_bytes())
    }

    /// Closes the writer, so `reader` sees end-of-file once it's drained.
    pub fn hang_up(self) -> UnixStream {
        let Self { reader, writer } = self;
        drop(writer);
        reader
    }
}
