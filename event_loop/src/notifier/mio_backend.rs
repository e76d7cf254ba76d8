// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words EINTR epoll kqueue rearm rearms

//! [`mio`] (epoll / kqueue) backend for the [`FileNotifier`].
//!
//! [`mio`] is edge-triggered, but file handlers expect level-triggered semantics: a
//! descriptor with unread data must keep being reported until someone reads it (or
//! until it loses the round-robin to another descriptor and waits its turn). So after
//! every wait, each descriptor that was reported is re-armed with
//! [`Registry::reregister()`], which makes the kernel re-check its readiness on the
//! next wait.
//!
//! Descriptors are identified by their fd number: `Token(fd as usize)`.
//!
//! [`FileNotifier`]: super::FileNotifier
//! [`Registry::reregister()`]: mio::Registry::reregister

use super::{FdInterest, FdReadiness};
use mio::{Events, Interest, Poll, Token, event::Event, unix::SourceFd};
use std::{io::{self, ErrorKind},
          os::fd::RawFd,
          time::Duration};

#[allow(missing_debug_implementations)]
pub struct MioBackend {
    pub poll_handle: Poll,
    /// Buffer for events returned by [`Poll::poll()`].
    pub ready_events_buffer: Events,
}

impl MioBackend {
    /// # Errors
    ///
    /// Fails if the epoll / kqueue instance can't be created (eg: out of descriptors).
    pub fn try_new(events_capacity: usize) -> io::Result<Self> {
        Ok(Self {
            poll_handle: Poll::new()?,
            ready_events_buffer: Events::with_capacity(events_capacity.max(1)),
        })
    }

    /// # Errors
    ///
    /// Returns the OS error if `fd` can't be monitored. epoll rejects regular files with
    /// `EPERM`, which is what triggers the fallback to `poll(2)`.
    pub fn register(&self, fd: RawFd, interest: FdInterest) -> io::Result<()> {
        let registry = self.poll_handle.registry();
        let token = token_for(fd)?;
        let interest = to_mio_interest(interest);
        match registry.register(&mut SourceFd(&fd), token, interest) {
            // A descriptor number reused after close without a deregister.
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                registry.reregister(&mut SourceFd(&fd), token, interest)
            }
            other => other,
        }
    }

    /// # Errors
    ///
    /// Returns the OS error if `fd` is no longer registered with the kernel.
    pub fn reregister(&self, fd: RawFd, interest: FdInterest) -> io::Result<()> {
        self.poll_handle.registry().reregister(
            &mut SourceFd(&fd),
            token_for(fd)?,
            to_mio_interest(interest),
        )
    }

    /// # Errors
    ///
    /// Returns the OS error if the descriptor was already closed (the kernel drops
    /// closed descriptors from epoll on its own, so callers usually ignore this).
    pub fn deregister(&self, fd: RawFd) -> io::Result<()> {
        self.poll_handle.registry().deregister(&mut SourceFd(&fd))
    }

    /// Blocks for at most `timeout` ([`None`] is forever) and returns normalized
    /// readiness for every reported descriptor.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Interrupted`] when a signal arrives while blocked, or any other
    /// error from the underlying wait.
    pub fn wait(&mut self, timeout: Option<Duration>) -> io::Result<Vec<(RawFd, FdReadiness)>> {
        self.poll_handle.poll(&mut self.ready_events_buffer, timeout)?;
        Ok(self
            .ready_events_buffer
            .iter()
            .filter_map(|event| {
                let fd = RawFd::try_from(event.token().0).ok()?;
                Some((fd, to_readiness(event)))
            })
            .collect())
    }

    /// Re-arms each `(fd, interest)` so data that is still unread gets reported again.
    /// A failure doesn't stop the others from being re-armed; every failure is
    /// returned.
    pub fn rearm(&self, reported: &[(RawFd, FdInterest)]) -> Vec<(RawFd, io::Error)> {
        reported
            .iter()
            .filter_map(|&(fd, interest)| {
                self.reregister(fd, interest).err().map(|err| (fd, err))
            })
            .collect()
    }
}

fn token_for(fd: RawFd) -> io::Result<Token> {
    usize::try_from(fd)
        .map(Token)
        .map_err(|_| io::Error::from(ErrorKind::InvalidInput))
}

/// [`mio`] insists on at least one of readable / writable. A handler that asked for
/// neither still hears about errors, which epoll reports under any interest.
fn to_mio_interest(interest: FdInterest) -> Interest {
    let mut acc: Option<Interest> = None;
    let mut add = |it: Interest| {
        acc = Some(match acc {
            Some(prev) => prev.add(it),
            None => it,
        });
    };
    if interest.readable {
        add(Interest::READABLE);
    }
    if interest.writable {
        add(Interest::WRITABLE);
    }
    #[cfg(any(target_os = "linux", target_os = "android"))]
    if interest.exceptional {
        add(Interest::PRIORITY);
    }
    acc.unwrap_or(Interest::READABLE)
}

fn to_readiness(event: &Event) -> FdReadiness {
    let readable = event.is_readable();
    let writable = event.is_writable();
    let hung_up = event.is_read_closed() || event.is_write_closed();
    FdReadiness {
        readable,
        writable,
        exceptional: event.is_priority(),
        // A hang up with nothing left to read is an error for the handler. While data
        // is still buffered the handler sees a plain readable event first.
        error: event.is_error() || (hung_up && !readable && !writable),
    }
}
