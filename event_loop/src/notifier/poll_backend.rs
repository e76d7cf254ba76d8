// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words NVAL revents

//! `poll(2)` backend for the [`FileNotifier`], via [`rustix::event::poll()`].
//!
//! Stateless: the interest set is rebuilt from the handler registry on every wait, so
//! there is nothing to register or deregister. `poll(2)` is level-triggered, and it
//! accepts any descriptor, including regular files that epoll rejects.
//!
//! [`FileNotifier`]: super::FileNotifier

use super::{FdInterest, FdReadiness};
use rustix::{event::{PollFd, PollFlags, Timespec},
             fd::BorrowedFd,
             io::Errno};
use std::{io, os::fd::RawFd, time::Duration};

/// Blocks for at most `timeout` ([`None`] is forever) on every `(fd, interest)` and
/// returns normalized readiness for the descriptors that have something to report.
///
/// # Errors
///
/// [`io::ErrorKind::Interrupted`] when a signal arrives while blocked, or any other
/// error from `poll(2)`.
pub fn poll_wait(
    interests: &[(RawFd, FdInterest)],
    timeout: Option<Duration>,
) -> io::Result<Vec<(RawFd, FdReadiness)>> {
    let mut poll_fds = interests
        .iter()
        .map(|(fd, interest)| {
            // SAFETY: every fd in the registry is owned by whoever registered it and
            // stays open until it is deleted, which can't happen during this call.
            let borrowed = unsafe { BorrowedFd::borrow_raw(*fd) };
            PollFd::from_borrowed_fd(borrowed, to_poll_flags(*interest))
        })
        .collect::<Vec<_>>();

    let timespec = timeout.map(to_timespec);
    rustix::event::poll(&mut poll_fds, timespec.as_ref()).map_err(|errno| {
        if errno == Errno::INTR {
            io::Error::from(io::ErrorKind::Interrupted)
        } else {
            io::Error::from(errno)
        }
    })?;

    Ok(interests
        .iter()
        .zip(poll_fds.iter())
        .map(|((fd, _), poll_fd)| (*fd, to_readiness(poll_fd.revents())))
        .filter(|(_, readiness)| readiness.is_ready())
        .collect())
}

fn to_poll_flags(interest: FdInterest) -> PollFlags {
    let mut flags = PollFlags::empty();
    if interest.readable {
        flags |= PollFlags::IN;
    }
    if interest.writable {
        flags |= PollFlags::OUT;
    }
    if interest.exceptional {
        flags |= PollFlags::PRI;
    }
    flags
}

fn to_readiness(revents: PollFlags) -> FdReadiness {
    let readable = revents.contains(PollFlags::IN);
    let hung_up = revents.contains(PollFlags::HUP);
    FdReadiness {
        readable,
        writable: revents.contains(PollFlags::OUT),
        exceptional: revents.contains(PollFlags::PRI),
        error: revents.intersects(PollFlags::ERR | PollFlags::NVAL) || (hung_up && !readable),
    }
}

fn to_timespec(duration: Duration) -> Timespec {
    Timespec {
        tv_sec: i64::try_from(duration.as_secs()).unwrap_or(i64::MAX),
        tv_nsec: duration.subsec_nanos().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SocketPair;
    use pretty_assertions::assert_eq;
    use std::io::Write as _;

    #[test]
    fn test_regular_file_is_always_readable() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"data").unwrap();
        let fd = std::os::fd::AsRawFd::as_raw_fd(&file);

        let ready = poll_wait(&[(fd, FdInterest::READABLE)], Some(Duration::ZERO)).unwrap();
        assert_eq!(ready.len(), 1);
        assert!(ready[0].1.readable);
    }

    #[test]
    fn test_only_ready_descriptors_are_returned() {
        let idle = SocketPair::new().unwrap();
        let busy = SocketPair::always_ready().unwrap();
        let ready = poll_wait(
            &[
                (idle.reader_fd(), FdInterest::READABLE),
                (busy.reader_fd(), FdInterest::READABLE),
            ],
            Some(Duration::ZERO),
        )
        .unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].0, busy.reader_fd());
    }

    #[test]
    fn test_hang_up_is_reported() {
        let pair = SocketPair::new().unwrap();
        let fd = pair.reader_fd();
        let reader = pair.hang_up();

        let ready = poll_wait(&[(fd, FdInterest::READABLE)], Some(Duration::ZERO)).unwrap();
        assert_eq!(ready.len(), 1);
        // Linux reports POLLIN | POLLHUP for a stream socket at EOF: readable, so the
        // handler reads and sees end of file.
        assert!(ready[0].1.readable || ready[0].1.error);
        drop(reader);
    }

    #[test]
    fn test_flags_and_readiness_mapping() {
        assert_eq!(
            to_poll_flags(FdInterest::READABLE.union(FdInterest::EXCEPTIONAL)),
            PollFlags::IN | PollFlags::PRI
        );
        assert!(to_readiness(PollFlags::NVAL).error);
        assert!(to_readiness(PollFlags::HUP).error);
        assert!(!to_readiness(PollFlags::HUP | PollFlags::IN).error);
    }
}
