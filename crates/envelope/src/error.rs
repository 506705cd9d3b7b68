//! Envelope Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// An envelope error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for envelope operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The recomputed hash/MAC does not match the stored one (or the stream
    /// was truncated). The data is corrupt or was tampered with; never retry
    /// with the same input.
    #[display("integrity tag mismatch")]
    IntegrityMismatch,
    /// The envelope declares a version outside of the registered range of its
    /// resource type (unknown resource types have no range at all).
    #[display("unsupported version {version} for resource type {resource}")]
    UnsupportedVersion {
        #[error(not(source))]
        resource: u32,
        #[error(not(source))]
        version: u32,
    },
    /// The envelope is intact but holds a different kind of resource than the
    /// one the caller asked for.
    #[display("expected a {expected} resource, found {found}")]
    ResourceMismatch {
        #[error(not(source))]
        expected: &'static str,
        #[error(not(source))]
        found: &'static str,
    },
    /// Reading from the wrapped stream failed.
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io)
    }

    /// Wrap a kind so it can travel through [`std::io::Read`] implementations.
    pub(crate) fn into_io(self) -> IoError {
        IoError::new(std::io::ErrorKind::InvalidData, self)
    }

    /// Recover an envelope error that was smuggled through an
    /// [`io::Error`](IoError) by one of this crate's readers. Any other I/O
    /// error is raised as [`ErrorKind::Io`] with the original as its child.
    #[track_caller]
    pub fn from_io(err: IoError) -> Error {
        if let Some(kind) = err.get_ref().and_then(|inner| inner.downcast_ref::<ErrorKind>()) {
            return exn::Exn::from(kind.clone());
        }
        exn::Exn::from(err).raise(ErrorKind::Io)
    }
}
