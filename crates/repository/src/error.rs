//! Repository Error Types

use derive_more::{Display, Error};

/// A repository error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for repository operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Blob is absent from both cache and storage. Callers may fall back.
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Configuration is missing, malformed or names something unsupported.
    #[display("invalid repository configuration: {_0}")]
    Config(#[error(not(source))] String),
    /// The repository is encrypted and no key was supplied.
    #[display("repository is encrypted: passphrase required")]
    PassphraseRequired,
    /// The supplied key does not reproduce the stored canary.
    #[display("wrong passphrase")]
    WrongPassphrase,
    /// A persisted resource failed envelope verification.
    #[display("corrupted resource: {_0}")]
    Corrupted(#[error(not(source))] String),
    /// Structural failure talking to the storage backend.
    #[display("storage backend failure")]
    Storage,
    /// Structural failure talking to the local cache.
    #[display("cache failure")]
    Cache,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage | Self::Cache)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Fatal at open: nothing can be read or written with this configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config(_) | Self::PassphraseRequired | Self::WrongPassphrase)
    }
}
