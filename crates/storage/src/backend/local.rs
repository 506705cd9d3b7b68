//! Local filesystem storage backend.
//!
//! This module provides a storage backend implementation for the local filesystem.
//! Blobs are stored below a configured directory and accessed using standard
//! filesystem operations via `tokio::fs` for async I/O.
//!
//! ```text
//! <root>/CONFIG
//! <root>/<resource>/<key[0..2]>/<key>
//! ```

use crate::backend::{KeyStream, not_found};
use crate::error::{ErrorKind, Result};
use crate::{StorageBackend, key::validate as validate_key};
use async_stream::stream;
use async_trait::async_trait;
use coffer_envelope::ResourceType;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

const CONFIG_FILE: &str = "CONFIG";

/// Local filesystem storage backend.
///
/// # Examples
///
/// ```no_run
/// use coffer_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("/path/to/repository")?;
/// # Ok(())
/// # }
/// ```
pub struct LocalBackend {
    /// Root directory of the repository
    root: PathBuf,
    origin: String,
    sequence: AtomicU64,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists but is not a
    /// directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidLocation(root.display().to_string()));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidLocation(root.display().to_string()));
            }
        } else {
            // Use non-async here; it'll only happen once on repository
            // initialization and it's not worth making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }
        let origin = root.display().to_string();
        Ok(Self { root, origin, sequence: AtomicU64::new(0) })
    }

    fn bucket_dir(&self, resource: ResourceType) -> PathBuf {
        self.root.join(resource.as_str())
    }

    /// Get the absolute path for a resource key.
    fn absolute_path(&self, resource: ResourceType, key: &str) -> Result<PathBuf> {
        let key = validate_key(key)?;
        let bucket = &key[..key.len().min(2)];
        Ok(self.bucket_dir(resource).join(bucket).join(key))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.display().to_string()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    /// Write through a temporary sibling and rename it into place, so readers
    /// never see a partially written file.
    async fn atomic_write(&self, path: &Path, data: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, parent))?;
        }
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("blob");
        let temporary = path.with_file_name(format!(".{name}.{}.{sequence}.tmp", std::process::id()));
        if let Err(e) = fs::write(&temporary, data).await {
            return Err(Self::map_io_error(e, &temporary).into());
        }
        if let Err(e) = fs::rename(&temporary, path).await {
            _ = fs::remove_file(&temporary).await;
            return Err(Self::map_io_error(e, path).into());
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn scheme(&self) -> &str {
        "fs"
    }

    fn origin(&self) -> &str {
        &self.origin
    }

    async fn create(&self, config: &[u8]) -> Result<()> {
        let path = self.root.join(CONFIG_FILE);
        if fs::try_exists(&path).await.map_err(ErrorKind::Io)? {
            exn::bail!(ErrorKind::AlreadyExists(self.origin.clone()));
        }
        for resource in ResourceType::ALL.into_iter().filter(|rt| *rt != ResourceType::Config) {
            let dir = self.bucket_dir(resource);
            fs::create_dir_all(&dir).await.map_err(|e| Self::map_io_error(e, &dir))?;
        }
        tracing::debug!(origin = %self.origin, "Creating repository");
        self.atomic_write(&path, config).await
    }

    async fn open(&self) -> Result<Vec<u8>> {
        let path = self.root.join(CONFIG_FILE);
        Ok(fs::read(&path).await.map_err(|e| Self::map_io_error(e, &path))?)
    }

    fn list_stream<'a>(&'a self, resource: ResourceType) -> KeyStream<'a> {
        let start_dir = self.bucket_dir(resource);
        Box::pin(stream! {
            // An unknown resource directory is an empty listing, not an error.
            let mut buckets = match fs::read_dir(&start_dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => return,
                Err(err) => {
                    yield Err(exn::Exn::from(Self::map_io_error(err, &start_dir)));
                    return;
                }
            };
            'buckets: loop {
                let bucket = match buckets.next_entry().await {
                    Ok(Some(bucket)) => bucket.path(),
                    Ok(None) => break 'buckets,
                    Err(e) => { yield Err(exn::Exn::from(Self::map_io_error(e, &start_dir))); continue 'buckets; },
                };
                let mut entries = match fs::read_dir(&bucket).await {
                    Ok(entries) => entries,
                    Err(e) => { yield Err(exn::Exn::from(Self::map_io_error(e, &bucket))); continue 'buckets; },
                };
                'entries: loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break 'entries,
                        Err(e) => { yield Err(exn::Exn::from(Self::map_io_error(e, &bucket))); continue 'entries; },
                    };
                    // Temporary files of in-flight writes are not keys.
                    match entry.file_name().to_str() {
                        Some(name) if validate_key(name).is_ok() => yield Ok(name.to_string()),
                        _ => {},
                    }
                }
            }
        })
    }

    async fn exists(&self, resource: ResourceType, key: &str) -> Result<bool> {
        let abs_path = self.absolute_path(resource, key)?;
        Ok(fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)?)
    }

    async fn get(&self, resource: ResourceType, key: &str) -> Result<Vec<u8>> {
        let abs_path = self.absolute_path(resource, key)?;
        match fs::read(&abs_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => exn::bail!(not_found(resource, key)),
            Err(e) => Err(Self::map_io_error(e, &abs_path).into()),
        }
    }

    async fn put(&self, resource: ResourceType, key: &str, data: &[u8]) -> Result<()> {
        let abs_path = self.absolute_path(resource, key)?;
        self.atomic_write(&abs_path, data).await
    }

    async fn delete(&self, resource: ResourceType, key: &str) -> Result<()> {
        let abs_path = self.absolute_path(resource, key)?;
        match fs::remove_file(&abs_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => exn::bail!(not_found(resource, key)),
            Err(e) => Err(Self::map_io_error(e, &abs_path).into()),
        }
    }
}
