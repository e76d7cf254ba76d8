// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words EINTR EPERM epoll kqueue

//! The file notifier: the set of monitored descriptors, plus the readiness backend
//! that waits on them.
//!
//! # Backends
//!
//! | Backend          | Used when                                                |
//! | :--------------- | :------------------------------------------------------- |
//! | [`MioBackend`]   | Default. Chosen on the first registration if it accepts it |
//! | [`poll_wait()`]  | [`NotifierBackendPreference::Poll`], or after a fallback   |
//!
//! The first registration decides. If [`mio`] can't be set up, or refuses that first
//! descriptor (epoll returns `EPERM` for regular files), the notifier switches to
//! `poll(2)` for good. The same happens if [`mio`] refuses a later descriptor: every
//! handler migrates to `poll(2)`, and the loop carries on.
//!
//! # One dispatch per wait
//!
//! [`wait()`] records readiness for every reported descriptor, but only hands back one
//! of them, picked round-robin by the [`FileHandlerRegistry`]. The driver runs that
//! callback before anything else happens.
//!
//! # Wake descriptor
//!
//! The read end of the async signal wake pipe is monitored like any other descriptor,
//! but it has no callback and isn't part of the round-robin. When it is ready,
//! [`wait()`] returns [`NotifierWait::Wake`] so the driver can run signal handlers.
//!
//! [`wait()`]: FileNotifier::wait

use super::{FdInterest, FileHandlerFn, FileHandlerRegistry, MioBackend, SelectedHandler,
            Upsert, poll_wait};
use crate::{DEBUG_EVENT_LOOP, EventLoopConfig, NotifierBackendPreference};
use std::{io::{self, ErrorKind},
          os::fd::RawFd,
          time::Duration};

/// Which readiness primitive is currently in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierBackendKind {
    /// Nothing registered yet, so [`mio`] hasn't been probed.
    Undecided,
    Mio,
    Poll,
}

enum Backend {
    Undecided,
    Mio(MioBackend),
    Poll,
}

/// Outcome of one [`FileNotifier::wait()`].
#[allow(missing_debug_implementations)]
pub enum NotifierWait {
    /// The timeout expired with nothing ready.
    TimedOut,
    /// A signal interrupted the wait (`EINTR`).
    Interrupted,
    /// The async signal wake descriptor is readable.
    Wake,
    /// One descriptor was picked for service.
    Ready(SelectedHandler),
}

#[allow(missing_debug_implementations)]
pub struct FileNotifier {
    registry: FileHandlerRegistry,
    backend: Backend,
    events_capacity: usize,
    wake_fd: Option<RawFd>,
}

impl FileNotifier {
    #[must_use]
    pub fn new(config: &EventLoopConfig) -> Self {
        let backend = match config.notifier_backend {
            NotifierBackendPreference::Auto => Backend::Undecided,
            NotifierBackendPreference::Poll => Backend::Poll,
        };
        Self {
            registry: FileHandlerRegistry::new(),
            backend,
            events_capacity: config.events_capacity,
            wake_fd: None,
        }
    }

    #[must_use]
    pub fn backend_kind(&self) -> NotifierBackendKind {
        match self.backend {
            Backend::Undecided => NotifierBackendKind::Undecided,
            Backend::Mio(_) => NotifierBackendKind::Mio,
            Backend::Poll => NotifierBackendKind::Poll,
        }
    }

    /// Starts monitoring `fd`, or replaces its callback and interest if it's already
    /// monitored.
    pub fn add(&mut self, fd: RawFd, interest: FdInterest, callback: FileHandlerFn) {
        match self.registry.upsert(fd, interest, callback) {
            Upsert::Added => self.register_with_backend(fd, interest),
            Upsert::Updated {
                interest_changed: true,
            } => {
                if let Backend::Mio(mio) = &self.backend
                    && let Err(err) = mio.reregister(fd, interest)
                {
                    self.fall_back_to_poll(fd, &err);
                }
            }
            Upsert::Updated {
                interest_changed: false,
            } => {}
        }
        DEBUG_EVENT_LOOP.then(|| {
            tracing::debug!(message = "file handler added", fd, ?interest);
        });
    }

    /// Stops monitoring `fd`. Returns `false` if it wasn't monitored.
    pub fn remove(&mut self, fd: RawFd) -> bool {
        if self.registry.remove(fd).is_none() {
            return false;
        }
        self.deregister_from_backend(fd);
        DEBUG_EVENT_LOOP.then(|| {
            tracing::debug!(message = "file handler deleted", fd);
        });
        true
    }

    #[must_use]
    pub fn contains(&self, fd: RawFd) -> bool { self.registry.contains(fd) }

    #[must_use]
    pub fn registry(&self) -> &FileHandlerRegistry { &self.registry }

    /// Sets (or clears) the descriptor whose readiness means "async signal pending".
    pub fn set_wake_fd(&mut self, wake_fd: Option<RawFd>) {
        if self.wake_fd == wake_fd {
            return;
        }
        if let Some(old) = self.wake_fd.take() {
            self.deregister_from_backend(old);
        }
        if let Some(new) = wake_fd {
            self.wake_fd = Some(new);
            self.register_with_backend(new, FdInterest::READABLE);
        }
    }

    #[must_use]
    pub fn wake_fd(&self) -> Option<RawFd> { self.wake_fd }

    /// Descriptors the next wait will monitor, including the wake descriptor.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.registry.len() + usize::from(self.wake_fd.is_some())
    }

    /// Waits at most `timeout` ([`None`] is forever) for any monitored descriptor.
    ///
    /// # Errors
    ///
    /// Any failure of the underlying wait other than `EINTR`.
    pub fn wait(&mut self, timeout: Option<Duration>) -> io::Result<NotifierWait> {
        self.registry.clear_readiness();

        let reported = if let Backend::Mio(mio) = &mut self.backend {
            mio.wait(timeout)
        } else {
            poll_wait(&self.all_interests(), timeout)
        };
        let reported = match reported {
            Ok(it) => it,
            Err(err) if err.kind() == ErrorKind::Interrupted => {
                return Ok(NotifierWait::Interrupted);
            }
            Err(err) => return Err(err),
        };

        let mut woke = false;
        let mut rearm = Vec::with_capacity(reported.len());
        for (fd, readiness) in reported {
            if Some(fd) == self.wake_fd {
                woke = true;
                rearm.push((fd, FdInterest::READABLE));
            } else if self.registry.set_readiness(fd, readiness) {
                if let Some(handler) = self.registry.get(fd) {
                    rearm.push((fd, handler.interest));
                }
            }
        }

        if let Backend::Mio(mio) = &self.backend {
            for (fd, err) in mio.rearm(&rearm) {
                tracing::warn!(message = "re-arming descriptor failed", fd, error = %err);
            }
        }

        if woke {
            return Ok(NotifierWait::Wake);
        }
        Ok(match self.registry.select_next_ready() {
            Some(selected) => {
                DEBUG_EVENT_LOOP.then(|| {
                    tracing::debug!(
                        message = "file handler selected",
                        fd = selected.event.fd,
                        error = selected.event.error,
                        next_to_service = ?self.registry.next_to_service()
                    );
                });
                NotifierWait::Ready(selected)
            }
            None => NotifierWait::TimedOut,
        })
    }

    fn all_interests(&self) -> Vec<(RawFd, FdInterest)> {
        let mut interests = self.registry.interests();
        if let Some(wake_fd) = self.wake_fd {
            interests.push((wake_fd, FdInterest::READABLE));
        }
        interests
    }

    fn register_with_backend(&mut self, fd: RawFd, interest: FdInterest) {
        match &self.backend {
            Backend::Poll => {}
            Backend::Mio(mio) => {
                if let Err(err) = mio.register(fd, interest) {
                    self.fall_back_to_poll(fd, &err);
                }
            }
            Backend::Undecided => {
                let probe = MioBackend::try_new(self.events_capacity)
                    .and_then(|mio| mio.register(fd, interest).map(|()| mio));
                match probe {
                    Ok(mio) => {
                        self.backend = Backend::Mio(mio);
                        DEBUG_EVENT_LOOP.then(|| {
                            tracing::debug!(message = "notifier backend chosen", backend = "mio");
                        });
                    }
                    Err(err) => self.fall_back_to_poll(fd, &err),
                }
            }
        }
    }

    fn deregister_from_backend(&self, fd: RawFd) {
        if let Backend::Mio(mio) = &self.backend
            && let Err(err) = mio.deregister(fd)
        {
            // Closing a descriptor removes it from epoll on its own.
            DEBUG_EVENT_LOOP.then(|| {
                tracing::debug!(message = "deregister failed", fd, error = %err);
            });
        }
    }

    /// Drops the [`mio`] instance (if any). Every handler is picked up by `poll(2)` on
    /// the next wait, since that backend reads interests straight from the registry.
    fn fall_back_to_poll(&mut self, fd: RawFd, err: &io::Error) {
        tracing::warn!(
            message = "mio rejected a descriptor, falling back to poll(2)",
            fd,
            error = %err
        );
        self.backend = Backend::Poll;
    }
}
