//! Cache root management.

use crate::VfsCache;
use crate::db::Database;
use crate::error::{ErrorKind, Result};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const VFS_DIR: &str = "vfs";
const DATABASE_FILE: &str = "cache.db";

/// Owner of a cache root directory, handing out per-repository stores laid
/// out as `<root>/vfs/<repository>/<scheme>/<origin>/`.
#[derive(Debug, Clone)]
pub struct CacheManager {
    root: PathBuf,
}

impl CacheManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every store of one repository.
    pub fn repository_dir(&self, repository: &str) -> PathBuf {
        self.root.join(VFS_DIR).join(path_component(repository))
    }

    /// Open (creating if needed) the store for a (repository, scheme, origin)
    /// triple.
    ///
    /// With `delete_on_close`, [`VfsCache::close`] removes the whole
    /// [`repository_dir`](Self::repository_dir), leaving no empty scaffolding
    /// behind.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn vfs(&self, repository: &str, scheme: &str, origin: &str, delete_on_close: bool) -> Result<VfsCache> {
        let repository_dir = self.repository_dir(repository);
        let path = repository_dir.join(path_component(scheme)).join(path_component(origin));
        if let Err(e) = tokio::fs::create_dir_all(&path).await {
            exn::bail!(ErrorKind::Io(e));
        }
        let db = Database::connect(path.join(DATABASE_FILE)).await?;
        let cleanup = delete_on_close.then_some(repository_dir);
        Ok(VfsCache::new(db, path, cleanup))
    }
}

/// Encode an arbitrary string as a single, reversible path component.
///
/// Alphanumerics, `-` and `_` pass through; every other byte (including `/`
/// and `.`) becomes `%xx`.
pub(crate) fn path_component(value: &str) -> String {
    if value.is_empty() {
        return "%".to_string();
    }
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_') {
            encoded.push(char::from(byte));
        } else {
            _ = write!(encoded, "%{byte:02x}");
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Category;
    use rstest::rstest;

    #[rstest]
    #[case("fs", "fs")]
    #[case("/tmp/repo", "%2ftmp%2frepo")]
    #[case("..", "%2e%2e")]
    #[case("", "%")]
    #[case("3f2a-uuid_x", "3f2a-uuid_x")]
    fn components_are_single_segments(#[case] input: &str, #[case] expected: &str) {
        let encoded = path_component(input);
        assert_eq!(encoded, expected);
        assert_eq!(Path::new(&encoded).components().count(), 1);
    }

    #[tokio::test]
    async fn test_layout() {
        let temp_dir = tempfile::tempdir().unwrap();
        let manager = CacheManager::new(temp_dir.path());
        let cache = manager.vfs("repo-1", "fs", "/srv/backup", false).await.unwrap();
        let expected = temp_dir.path().join("vfs/repo-1/fs/%2fsrv%2fbackup");
        assert_eq!(cache.path(), expected);
        assert!(expected.join(DATABASE_FILE).exists());
        cache.close().await.unwrap();
        assert!(expected.exists(), "persistent cache must survive close");
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let manager = CacheManager::new(temp_dir.path());
        let cache = manager.vfs("repo", "mock", "tmp", false).await.unwrap();
        cache.put_directory("/", b"root").await.unwrap();
        cache.close().await.unwrap();

        let cache = manager.vfs("repo", "mock", "tmp", false).await.unwrap();
        assert_eq!(cache.get_directory("/").await.unwrap(), b"root");
        cache.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_ephemeral_cleanup_leaves_siblings() {
        let temp_dir = tempfile::tempdir().unwrap();
        let manager = CacheManager::new(temp_dir.path());
        let sibling = manager.vfs("sibling", "mock", "tmp", false).await.unwrap();
        sibling.put_filename("/keep", b"data").await.unwrap();
        let ephemeral = manager.vfs("ephemeral", "mock", "tmp", true).await.unwrap();
        ephemeral.put_filename("/drop", b"data").await.unwrap();

        ephemeral.close().await.unwrap();
        assert!(!manager.repository_dir("ephemeral").exists());
        assert!(temp_dir.path().join(VFS_DIR).exists());
        assert!(manager.repository_dir("sibling").exists());
        assert_eq!(sibling.get_filename("/keep").await.unwrap(), b"data");
        sibling.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_stores_are_isolated_by_origin() {
        let temp_dir = tempfile::tempdir().unwrap();
        let manager = CacheManager::new(temp_dir.path());
        let a = manager.vfs("repo", "fs", "/a", false).await.unwrap();
        let b = manager.vfs("repo", "fs", "/b", false).await.unwrap();
        a.put(Category::Object, "00", b"a").await.unwrap();
        assert!(b.get(Category::Object, "00").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_concurrent_puts() {
        let temp_dir = tempfile::tempdir().unwrap();
        let manager = CacheManager::new(temp_dir.path());
        let cache = manager.vfs("repo", "mock", "tmp", false).await.unwrap();
        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..32 {
            let cache = cache.clone();
            tasks.spawn(async move {
                let key = format!("/file-{i:02}");
                cache.put_filename(&key, key.as_bytes()).await
            });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }
        let keys = cache.keys(Category::Filename).await.unwrap();
        assert_eq!(keys.len(), 32);
        for key in keys {
            assert_eq!(cache.get_filename(&key).await.unwrap(), key.as_bytes());
        }
        cache.close().await.unwrap();
    }
}
