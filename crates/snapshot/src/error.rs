//! Snapshot Error Types
//!
//! Per-entry scan failures never show up here: the builder turns them into
//! summary counters. These are the failures that stop a snapshot (or a
//! read-back) as a whole.

use derive_more::{Display, Error};

/// A snapshot error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for snapshot operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Writing to the cache or storage backend failed; the snapshot is aborted.
    #[display("structural persist failure")]
    Persist,
    /// The builder is not in a state that allows the operation.
    #[display("snapshot builder is {_0}")]
    InvalidState(#[error(not(source))] &'static str),
    /// An exclusion pattern does not compile.
    #[display("invalid exclusion pattern: {_0}")]
    Pattern(#[error(not(source))] String),
    /// The importer could not start (missing root, unreadable root, ...).
    #[display("importer failure: {_0}")]
    Importer(#[error(not(source))] String),
    /// Path is absent from the snapshot.
    #[display("no such file or directory: {_0}")]
    NotFound(#[error(not(source))] String),
    #[display("not a directory: {_0}")]
    NotADirectory(#[error(not(source))] String),
    #[display("is a directory: {_0}")]
    IsADirectory(#[error(not(source))] String),
    /// Snapshot metadata exists but cannot be decoded or verified.
    #[display("corrupted snapshot: {_0}")]
    Corrupted(#[error(not(source))] String),
    /// Reading back from the repository failed.
    #[display("repository failure")]
    Repository,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persist | Self::Repository)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
