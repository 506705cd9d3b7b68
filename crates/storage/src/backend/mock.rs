//! In-memory storage backend for testing.

use super::{KeyStream, not_found};
use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::key::validate as validate_key;
use async_stream::stream;
use async_trait::async_trait;
use coffer_envelope::ResourceType;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

type Blobs = HashMap<(ResourceType, String), Vec<u8>>;

/// In-memory storage backend for testing.
///
/// Blobs are stored in a `HashMap` behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation. Ideal for unit
/// tests that need a [`StorageBackend`] without filesystem dependencies.
///
/// # Examples
///
/// ```
/// use coffer_envelope::ResourceType;
/// use coffer_storage::backend::{MockBackend, StorageBackend};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_blobs([
///     (ResourceType::Object, "abcd", b"data".to_vec()),
/// ]);
/// assert!(backend.exists(ResourceType::Object, "abcd").await?);
///
/// backend.put(ResourceType::Snapshot, "ef01", b"header").await?;
/// assert!(backend.exists(ResourceType::Snapshot, "ef01").await?);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    origin: String,
    config: RwLock<Option<Vec<u8>>>,
    storage: RwLock<Blobs>,
    fail_writes: AtomicBool,
}

impl MockBackend {
    /// Create a mock backend pre-populated with blobs.
    ///
    /// Panics if any key fails validation. If test setup is wrong, then test
    /// should not pass.
    pub fn with_blobs(blobs: impl IntoIterator<Item = (ResourceType, impl Into<String>, Vec<u8>)>) -> Self {
        let mut map = HashMap::new();
        for (resource, key, data) in blobs {
            let key = key.into();
            if validate_key(&key).is_err() {
                // The panic here is DELIBERATE. MockBackend is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockBackend::with_blobs: invalid key {key:?}");
            }
            map.insert((resource, key), data);
        }
        Self {
            origin: "tmp".to_string(),
            config: RwLock::new(None),
            storage: RwLock::new(map),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Change the origin reported by the mock backend.
    ///
    /// # Example
    ///
    /// ```
    /// use coffer_storage::backend::{MockBackend, StorageBackend};
    ///
    /// let backend = MockBackend::default().with_origin("test");
    /// assert_eq!(backend.origin(), "test");
    /// ```
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Make every subsequent `put` (and `create`) fail with a
    /// [`BackendError`](ErrorKind::BackendError).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of blobs stored for a resource type.
    pub async fn count(&self, resource: ResourceType) -> usize {
        self.storage.read().await.keys().filter(|(rt, _)| *rt == resource).count()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::BackendError("injected write failure".to_string()));
        }
        Ok(())
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        Self::with_blobs(std::iter::empty::<(ResourceType, String, Vec<u8>)>())
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn scheme(&self) -> &str {
        "mock"
    }

    fn origin(&self) -> &str {
        &self.origin
    }

    async fn create(&self, config: &[u8]) -> Result<()> {
        self.check_writable()?;
        let mut guard = self.config.write().await;
        if guard.is_some() {
            exn::bail!(ErrorKind::AlreadyExists(format!("mock://{}", self.origin)));
        }
        *guard = Some(config.to_vec());
        Ok(())
    }

    async fn open(&self) -> Result<Vec<u8>> {
        let guard = self.config.read().await;
        guard.clone().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(format!("mock://{}", self.origin))))
    }

    fn list_stream<'a>(&'a self, resource: ResourceType) -> KeyStream<'a> {
        Box::pin(stream! {
            // Snapshot matching keys under the read lock, then drop it before
            // yielding to avoid holding the lock across yield points.
            let keys: Vec<String> = {
                let guard = self.storage.read().await;
                guard.keys().filter(|(rt, _)| *rt == resource).map(|(_, key)| key.clone()).collect()
            };
            for key in keys {
                yield Ok(key);
            }
        })
    }

    async fn exists(&self, resource: ResourceType, key: &str) -> Result<bool> {
        let key = validate_key(key)?;
        Ok(self.storage.read().await.contains_key(&(resource, key.to_string())))
    }

    async fn get(&self, resource: ResourceType, key: &str) -> Result<Vec<u8>> {
        let key = validate_key(key)?;
        let guard = self.storage.read().await;
        let data = guard.get(&(resource, key.to_string())).ok_or_else(|| exn::Exn::from(not_found(resource, key)))?;
        Ok(data.clone())
    }

    async fn put(&self, resource: ResourceType, key: &str, data: &[u8]) -> Result<()> {
        let key = validate_key(key)?;
        self.check_writable()?;
        self.storage.write().await.insert((resource, key.to_string()), data.to_vec());
        Ok(())
    }

    async fn delete(&self, resource: ResourceType, key: &str) -> Result<()> {
        let key = validate_key(key)?;
        self.storage
            .write()
            .await
            .remove(&(resource, key.to_string()))
            .map(|_| ())
            .ok_or_else(|| exn::Exn::from(not_found(resource, key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get() {
        let backend = MockBackend::default();
        backend.put(ResourceType::Object, "abcd", b"hello").await.unwrap();
        assert_eq!(backend.get(ResourceType::Object, "abcd").await.unwrap(), b"hello");
        let err = backend.get(ResourceType::Vfs, "abcd").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(key) if key == "vfs/abcd"));
    }

    #[tokio::test]
    async fn test_create_and_open() {
        let backend = MockBackend::default();
        assert!(backend.open().await.unwrap_err().is_not_found());
        backend.create(b"config").await.unwrap();
        assert_eq!(backend.open().await.unwrap(), b"config");
        let err = backend.create(b"config").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_delete() {
        let backend = MockBackend::default();
        backend.put(ResourceType::Object, "abcd", b"data").await.unwrap();
        backend.delete(ResourceType::Object, "abcd").await.unwrap();
        assert!(!backend.exists(ResourceType::Object, "abcd").await.unwrap());
        // Delete nonexistent → NotFound
        let err = backend.delete(ResourceType::Object, "abcd").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_by_resource() {
        let backend = MockBackend::with_blobs([
            (ResourceType::Object, "aa", b"a".to_vec()),
            (ResourceType::Object, "bb", b"b".to_vec()),
            (ResourceType::Snapshot, "cc", b"c".to_vec()),
        ]);
        let mut keys = backend.list(ResourceType::Object).await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["aa", "bb"]);
        assert_eq!(backend.count(ResourceType::Snapshot).await, 1);
        assert!(backend.list(ResourceType::Vfs).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let backend = MockBackend::default();
        backend.fail_writes(true);
        let err = backend.put(ResourceType::Object, "abcd", b"data").await.unwrap_err();
        assert!(err.is_retryable());
        backend.fail_writes(false);
        backend.put(ResourceType::Object, "abcd", b"data").await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_key_rejected() {
        let backend = MockBackend::default();
        assert!(backend.get(ResourceType::Object, "../etc/passwd").await.is_err());
        assert!(backend.put(ResourceType::Object, "../escape", b"bad").await.is_err());
    }

    #[test]
    #[should_panic(expected = "invalid key")]
    fn test_with_blobs_panics_on_bad_key() {
        MockBackend::with_blobs([(ResourceType::Object, "../escape", b"bad".to_vec())]);
    }
}
