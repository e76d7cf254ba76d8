// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words CLOEXEC EAGAIN

//! Self-pipe that makes a blocked readiness wait return when an async signal handler
//! is marked.
//!
//! [`wake()`] is a single `write(2)` of one byte on a non-blocking pipe, which is
//! async-signal-safe: no allocation, no locks. A full pipe means a wake is already
//! pending, so `EAGAIN` is ignored.
//!
//! [`wake()`]: WakePipe::wake

use crate::{EventLoopError, EventLoopResult};
use rustix::{fd::{AsFd, AsRawFd as _, OwnedFd},
             io::{Errno, FdFlags}};
use std::os::fd::RawFd;

#[derive(Debug)]
pub struct WakePipe {
    read_end: OwnedFd,
    write_end: OwnedFd,
}

impl WakePipe {
    /// # Errors
    ///
    /// [`EventLoopError::WakePipeCreation`] if the pipe can't be created or made
    /// non-blocking.
    pub fn try_new() -> EventLoopResult<Self> {
        let create = || -> rustix::io::Result<Self> {
            let (read_end, write_end) = rustix::pipe::pipe()?;
            for fd in [&read_end, &write_end] {
                rustix::io::ioctl_fionbio(fd, true)?;
                rustix::io::fcntl_setfd(fd, FdFlags::CLOEXEC)?;
            }
            Ok(Self {
                read_end,
                write_end,
            })
        };
        create().map_err(|errno| EventLoopError::WakePipeCreation(errno.into()).into())
    }

    /// Descriptor to monitor for readability.
    #[must_use]
    pub fn read_fd(&self) -> RawFd { self.read_end.as_raw_fd() }

    /// Async-signal-safe.
    pub fn wake(&self) {
        loop {
            match rustix::io::write(self.write_end.as_fd(), &[1]) {
                Err(Errno::INTR) => {}
                // Ok, or the pipe is full (a wake is already pending), or the read end
                // is gone. None of these can be reported from signal context.
                _ => break,
            }
        }
    }

    /// Drains every pending wake byte.
    pub fn clear(&self) {
        let mut buffer = [0_u8; 64];
        loop {
            match rustix::io::read(self.read_end.as_fd(), &mut buffer[..]) {
                Ok(0) => break,
                Ok(_) | Err(Errno::INTR) => {}
                Err(_) => break,
            }
        }
    }
}
