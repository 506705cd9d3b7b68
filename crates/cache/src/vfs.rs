//! Per-repository VFS cache store.

use crate::Category;
use crate::db::Database;
use crate::error::{ErrorKind, Result};
use coffer_envelope::Mac;
use exn::ResultExt;
use std::path::{Path, PathBuf};

/// Durable `(category, key) -> bytes` store for one
/// (repository, scheme, origin) triple.
///
/// Entries are never evicted. Handles are cheap to clone and safe to use from
/// concurrent tasks; each [`put`](Self::put) is a single atomic upsert.
#[derive(Debug, Clone)]
pub struct VfsCache {
    db: Database,
    path: PathBuf,
    /// Repository-scoped directory removed by [`close`](Self::close).
    cleanup: Option<PathBuf>,
}

impl VfsCache {
    pub(crate) fn new(db: Database, path: PathBuf, cleanup: Option<PathBuf>) -> Self {
        Self { db, path, cleanup }
    }

    /// Store directory holding this cache's database.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or overwrite an entry.
    pub async fn put(&self, category: Category, key: &str, value: &[u8]) -> Result<()> {
        sqlx::query(include_str!("../queries/put_entry.sql"))
            .bind(category.as_str())
            .bind(key)
            .bind(value)
            .execute(self.db.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Fetch an entry, failing with [`NotFound`](ErrorKind::NotFound) on a miss.
    pub async fn get(&self, category: Category, key: &str) -> Result<Vec<u8>> {
        let value: Option<Vec<u8>> = sqlx::query_scalar(include_str!("../queries/get_entry.sql"))
            .bind(category.as_str())
            .bind(key)
            .fetch_optional(self.db.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        match value {
            Some(value) => Ok(value),
            None => exn::bail!(ErrorKind::NotFound(format!("{category}/{key}"))),
        }
    }

    pub async fn contains(&self, category: Category, key: &str) -> Result<bool> {
        sqlx::query_scalar(include_str!("../queries/contains_entry.sql"))
            .bind(category.as_str())
            .bind(key)
            .fetch_one(self.db.pool())
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// All keys of a category, in ascending order.
    pub async fn keys(&self, category: Category) -> Result<Vec<String>> {
        sqlx::query_scalar(include_str!("../queries/list_keys.sql"))
            .bind(category.as_str())
            .fetch_all(self.db.pool())
            .await
            .or_raise(|| ErrorKind::Database)
    }

    // =========================================================================
    // Typed helpers
    // =========================================================================

    pub async fn put_directory(&self, path: &str, value: &[u8]) -> Result<()> {
        self.put(Category::Directory, path, value).await
    }

    pub async fn get_directory(&self, path: &str) -> Result<Vec<u8>> {
        self.get(Category::Directory, path).await
    }

    pub async fn put_filename(&self, path: &str, value: &[u8]) -> Result<()> {
        self.put(Category::Filename, path, value).await
    }

    pub async fn get_filename(&self, path: &str) -> Result<Vec<u8>> {
        self.get(Category::Filename, path).await
    }

    pub async fn put_file_summary(&self, path: &str, value: &[u8]) -> Result<()> {
        self.put(Category::FileSummary, path, value).await
    }

    pub async fn get_file_summary(&self, path: &str) -> Result<Vec<u8>> {
        self.get(Category::FileSummary, path).await
    }

    pub async fn put_object(&self, mac: &Mac, value: &[u8]) -> Result<()> {
        self.put(Category::Object, &mac.to_hex(), value).await
    }

    pub async fn get_object(&self, mac: &Mac) -> Result<Vec<u8>> {
        self.get(Category::Object, &mac.to_hex()).await
    }

    pub async fn has_object(&self, mac: &Mac) -> Result<bool> {
        self.contains(Category::Object, &mac.to_hex()).await
    }

    /// Close the underlying pool. An ephemeral cache also removes its whole
    /// repository-scoped directory (`<root>/vfs/<repository>`).
    ///
    /// Other clones of this handle must not be used afterwards.
    pub async fn close(&self) -> Result<()> {
        self.db.close().await;
        let Some(dir) = &self.cleanup else {
            return Ok(());
        };
        tracing::debug!(path = %dir.display(), "Removing ephemeral cache");
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => exn::bail!(ErrorKind::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    async fn cache() -> VfsCache {
        let db = Database::connect_in_memory().await.unwrap();
        VfsCache::new(db, PathBuf::from(":memory:"), None)
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = cache().await;
        cache.put(Category::Directory, "/a", b"one").await.unwrap();
        assert_eq!(cache.get(Category::Directory, "/a").await.unwrap(), b"one");
        assert!(cache.contains(Category::Directory, "/a").await.unwrap());
    }

    #[rstest]
    #[case(Category::Directory)]
    #[case(Category::Filename)]
    #[case(Category::FileSummary)]
    #[case(Category::Object)]
    #[tokio::test]
    async fn test_miss_is_not_found(#[case] category: Category) {
        let cache = cache().await;
        let err = cache.get(category, "missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!cache.contains(category, "missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_categories_are_separate_key_spaces() {
        let cache = cache().await;
        cache.put_directory("/a", b"dir").await.unwrap();
        cache.put_filename("/a", b"file").await.unwrap();
        assert_eq!(cache.get_directory("/a").await.unwrap(), b"dir");
        assert_eq!(cache.get_filename("/a").await.unwrap(), b"file");
        assert!(cache.get_file_summary("/a").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let cache = cache().await;
        cache.put_file_summary("/a/b", b"first").await.unwrap();
        cache.put_file_summary("/a/b", b"second").await.unwrap();
        assert_eq!(cache.get_file_summary("/a/b").await.unwrap(), b"second");
        assert_eq!(cache.keys(Category::FileSummary).await.unwrap(), vec!["/a/b"]);
    }

    #[tokio::test]
    async fn test_object_keyed_by_hex() {
        let cache = cache().await;
        let mac = Mac::from_bytes([0xab; 32]);
        cache.put_object(&mac, b"content").await.unwrap();
        assert!(cache.has_object(&mac).await.unwrap());
        assert_eq!(cache.get(Category::Object, &"ab".repeat(32)).await.unwrap(), b"content");
        assert_eq!(cache.get_object(&mac).await.unwrap(), b"content");
    }

    #[tokio::test]
    async fn test_keys_are_ordered() {
        let cache = cache().await;
        for key in ["/c", "/a", "/b/z", "/b"] {
            cache.put_directory(key, b"").await.unwrap();
        }
        assert_eq!(cache.keys(Category::Directory).await.unwrap(), vec!["/a", "/b", "/b/z", "/c"]);
        assert!(cache.keys(Category::Object).await.unwrap().is_empty());
    }
}
