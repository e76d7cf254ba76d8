// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Backend-neutral interest and readiness types. Callbacks never see native bits from
//! [`mio`] or `poll(2)`, only [`FileHandlerEvent`].

use std::os::fd::RawFd;

/// Conditions a file handler wants to be woken for. Error conditions (hang up, error,
/// invalid descriptor) are always reported and can't be requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FdInterest {
    pub readable: bool,
    pub writable: bool,
    /// Out-of-band / priority data.
    pub exceptional: bool,
}

impl FdInterest {
    /// The default for line-oriented input: readable (or error).
    pub const READABLE: Self = Self {
        readable: true,
        writable: false,
        exceptional: false,
    };

    pub const WRITABLE: Self = Self {
        readable: false,
        writable: true,
        exceptional: false,
    };

    pub const EXCEPTIONAL: Self = Self {
        readable: false,
        writable: false,
        exceptional: true,
    };

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self {
            readable: self.readable || other.readable,
            writable: self.writable || other.writable,
            exceptional: self.exceptional || other.exceptional,
        }
    }
}

/// What a backend observed for one descriptor during a single wait, already
/// normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FdReadiness {
    pub readable: bool,
    pub writable: bool,
    pub exceptional: bool,
    pub error: bool,
}

impl FdReadiness {
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.readable || self.writable || self.exceptional || self.error
    }

    /// Drops the conditions this handler didn't ask for. Errors always pass through.
    #[must_use]
    pub const fn masked_by(self, interest: FdInterest) -> Self {
        Self {
            readable: self.readable && interest.readable,
            writable: self.writable && interest.writable,
            exceptional: self.exceptional && interest.exceptional,
            error: self.error,
        }
    }
}

/// What a file handler callback receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHandlerEvent {
    pub fd: RawFd,
    /// An error condition was reported for `fd`. The callback decides whether that is
    /// fatal for whatever owns the descriptor.
    pub error: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_masked_by_keeps_errors() {
        let readiness = FdReadiness {
            readable: true,
            writable: true,
            exceptional: false,
            error: true,
        };
        assert_eq!(readiness.masked_by(FdInterest::EXCEPTIONAL), FdReadiness {
            readable: false,
            writable: false,
            exceptional: false,
            error: true,
        });
        assert!(
            !FdReadiness {
                writable: true,
                ..FdReadiness::default()
            }
            .masked_by(FdInterest::READABLE)
            .is_ready()
        );
    }

    #[test]
    fn test_union() {
        assert_eq!(
            FdInterest::READABLE.union(FdInterest::WRITABLE),
            FdInterest {
                readable: true,
                writable: true,
                exceptional: false,
            }
        );
    }
}
