//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, a durable blob store
//! addressed by [`ResourceType`] and key, plus the repository bootstrap
//! operations ([`create`](StorageBackend::create) and
//! [`open`](StorageBackend::open)) that store the wrapped configuration.

mod local;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod ro;

pub use self::local::LocalBackend;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockBackend;
pub use self::ro::ReadOnlyBackend;
use crate::BackendHandle;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use coffer_envelope::ResourceType;
use futures::{Stream, TryStreamExt};
use std::pin::Pin;
use std::sync::Arc;

pub(crate) type KeyStream<'a> = Pin<Box<dyn Stream<Item = Result<String>> + Send + 'a>>;

/// Unified interface for storage backends.
///
/// All storage operations are asynchronous to efficiently handle network
/// operations and concurrent access. Implementations must be safe to share
/// between tasks; every [`put`](Self::put) is atomic (readers never observe a
/// partially written blob).
///
/// # Keys
/// All keys must be validated using [`validate_key`](crate::validate_key)
/// before use. Implementations should enforce this validation.
///
/// # Examples
///
/// ```
/// use coffer_envelope::ResourceType;
/// use coffer_storage::{backend::StorageBackend, error::Result};
///
/// async fn size_of_object(backend: &dyn StorageBackend, key: &str) -> Result<u64> {
///     if backend.exists(ResourceType::Object, key).await? {
///         let data = backend.get(ResourceType::Object, key).await?;
///         Ok(data.len() as u64)
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Storage scheme (`fs`, `mock`, ...). Used to scope local caches.
    fn scheme(&self) -> &str;

    /// Where the repository lives, in a form unique within the scheme. Used
    /// to scope local caches and for logging.
    fn origin(&self) -> &str;

    /// Initialize a new repository by storing its wrapped configuration.
    ///
    /// Returns [`AlreadyExists`](ErrorKind::AlreadyExists) if a configuration
    /// is already present.
    async fn create(&self, config: &[u8]) -> Result<()>;

    /// Read back the wrapped configuration written by [`create`](Self::create).
    ///
    /// Returns [`NotFound`](ErrorKind::NotFound) if the location holds no
    /// repository.
    async fn open(&self) -> Result<Vec<u8>>;

    /// List all keys of a resource type.
    ///
    /// Default implementation of this method is to collect all the results
    /// from [`list_stream()`](Self::list_stream) into a [`Vec`] before
    /// returning.
    async fn list(&self, resource: ResourceType) -> Result<Vec<String>> {
        self.list_stream(resource).try_collect().await
    }

    /// Stream the keys of a resource type, yielding results incrementally.
    ///
    /// # Examples
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// use coffer_envelope::ResourceType;
    /// # use coffer_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let mut stream = backend.list_stream(ResourceType::Snapshot);
    /// while let Some(key) = stream.try_next().await? {
    ///     println!("snapshot {key}");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream<'a>(&'a self, resource: ResourceType) -> KeyStream<'a>;

    /// Check if a blob exists.
    async fn exists(&self, resource: ResourceType, key: &str) -> Result<bool>;

    /// Read a blob.
    ///
    /// Returns [`NotFound`](ErrorKind::NotFound) if the blob does not exist.
    async fn get(&self, resource: ResourceType, key: &str) -> Result<Vec<u8>>;

    /// Write a blob, overwriting any previous value.
    async fn put(&self, resource: ResourceType, key: &str, data: &[u8]) -> Result<()>;

    /// Delete a blob.
    ///
    /// Returns [`NotFound`](ErrorKind::NotFound) if the blob does not exist.
    async fn delete(&self, resource: ResourceType, key: &str) -> Result<()>;
}

pub(crate) fn not_found(resource: ResourceType, key: &str) -> ErrorKind {
    ErrorKind::NotFound(format!("{resource}/{key}"))
}

/// Build a backend from a location string.
///
/// - `fs:///absolute/path` or a bare absolute path → [`LocalBackend`]
/// - `mock://anything` → [`MockBackend`] (requires the `mock` feature)
///
/// # Examples
///
/// ```no_run
/// let backend = coffer_storage::backend::from_location("fs:///var/backups/repo")?;
/// assert_eq!(backend.scheme(), "fs");
/// # Ok::<(), coffer_storage::error::Error>(())
/// ```
pub fn from_location(location: &str) -> Result<BackendHandle> {
    let (scheme, rest) = match location.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None if location.starts_with('/') => ("fs", location),
        None => exn::bail!(ErrorKind::InvalidLocation(location.to_string())),
    };
    match scheme {
        "fs" => Ok(Arc::new(LocalBackend::new(rest)?)),
        #[cfg(any(test, feature = "mock"))]
        "mock" => Ok(Arc::new(MockBackend::default().with_origin(rest))),
        _ => exn::bail!(ErrorKind::InvalidLocation(location.to_string())),
    }
}
