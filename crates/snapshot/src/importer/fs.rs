//! Local filesystem importer.

use super::{FileInfo, FileKind, Importer, ImporterInfo, LazyReader, ScanError, ScanRecord, ScanResult};
use crate::error::{ErrorKind, Result};
use crate::path;
use async_trait::async_trait;
use coffer_repository::Context;
use futures::StreamExt;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::mpsc;

const DEFAULT_ORIGIN: &str = "localhost";
const DEFAULT_CONCURRENCY: usize = 8;

/// A listed entry: its snapshot path and local path, or why it can't be read.
type Listing = std::result::Result<(String, PathBuf), ScanError>;

/// Walks a local directory tree depth-first.
///
/// Symlinks are recorded, never followed. Entries whose name isn't valid
/// UTF-8 are reported as scan errors against their parent directory.
#[derive(Debug, Clone)]
pub struct FsImporter {
    root: PathBuf,
    directory: String,
    origin: String,
    max_concurrency: usize,
}

impl FsImporter {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let Some(directory) = root.to_str().and_then(path::normalize) else {
            exn::bail!(ErrorKind::Importer(format!("scan root must be an absolute UTF-8 path: {}", root.display())));
        };
        Ok(Self {
            root: PathBuf::from(&directory),
            directory,
            origin: DEFAULT_ORIGIN.to_string(),
            max_concurrency: DEFAULT_CONCURRENCY,
        })
    }

    /// Importer configured from the runtime settings of `ctx`: the recorded
    /// origin and the metadata lookup concurrency.
    pub fn from_context(root: impl AsRef<Path>, ctx: &Context) -> Result<Self> {
        let settings = ctx.settings();
        Ok(Self::new(root)?.with_origin(settings.origin.clone()).with_max_concurrency(settings.max_concurrency))
    }

    /// Host recorded in the snapshot header.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Number of entries of one directory whose metadata is fetched at once.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    fn file_info(name: &str, metadata: &Metadata) -> FileInfo {
        let file_type = metadata.file_type();
        let kind = if file_type.is_dir() {
            FileKind::Directory
        } else if file_type.is_symlink() {
            FileKind::Symlink
        } else if file_type.is_file() {
            FileKind::Regular
        } else {
            FileKind::Other
        };
        let info = FileInfo { size: metadata.len(), ..FileInfo::new(name, kind) };
        Self::with_unix_metadata(info, metadata)
    }

    #[cfg(unix)]
    fn with_unix_metadata(mut info: FileInfo, metadata: &Metadata) -> FileInfo {
        use std::os::unix::fs::MetadataExt;
        info.mode = metadata.mode() & 0o7777;
        info.nlink = metadata.nlink();
        // Numeric ids; resolving names needs a user database this crate
        // doesn't carry.
        info.with_owner(metadata.uid().to_string(), metadata.gid().to_string())
    }

    #[cfg(not(unix))]
    fn with_unix_metadata(info: FileInfo, _metadata: &Metadata) -> FileInfo {
        info
    }

    fn record(path: &str, local: PathBuf, metadata: &Metadata) -> ScanResult {
        let info = Self::file_info(path::file_name(path), metadata);
        let mut record = ScanRecord::new(path, info);
        if record.info.kind == FileKind::Regular {
            record = record.with_reader(LazyReader::new(move || std::fs::File::open(local)));
        }
        ScanResult::Record(record)
    }

    /// Read the entries of one directory. A non UTF-8 name, or a failure
    /// partway through the listing, becomes an error in place of the entry.
    async fn list(current: &str, local: &Path) -> io::Result<Vec<Listing>> {
        let mut entries = fs::read_dir(local).await?;
        let mut listed = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    listed.push(Err(ScanError::new(current, e)));
                    break;
                },
            };
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                tracing::warn!(path = %entry.path().display(), "File name is not valid UTF-8");
                let lossy = path::join(current, &file_name.to_string_lossy()).unwrap_or_else(|| current.to_string());
                let error = io::Error::new(io::ErrorKind::InvalidData, "file name is not valid UTF-8");
                listed.push(Err(ScanError::new(lossy, error)));
                continue;
            };
            if let Some(child) = path::join(current, name) {
                listed.push(Ok((child, entry.path())));
            }
        }
        Ok(listed)
    }

    /// Stat one listed entry; directories are handed back for descent.
    async fn lookup(listing: Listing) -> (ScanResult, Option<(String, PathBuf)>) {
        let (child, local) = match listing {
            Ok(listing) => listing,
            Err(error) => return (error.into(), None),
        };
        match fs::symlink_metadata(&local).await {
            Ok(metadata) => {
                let descend = metadata.is_dir().then(|| (child.clone(), local.clone()));
                (Self::record(&child, local, &metadata), descend)
            },
            Err(e) => (ScanError::new(child, e).into(), None),
        }
    }
}

#[async_trait]
impl Importer for FsImporter {
    fn info(&self) -> ImporterInfo {
        ImporterInfo { kind: "fs".to_string(), origin: self.origin.clone(), directory: self.directory.clone() }
    }

    #[tracing::instrument(skip_all, fields(root = %self.directory, max_concurrency = self.max_concurrency))]
    async fn scan(&self, results: mpsc::Sender<ScanResult>) -> Result<()> {
        let metadata = match fs::symlink_metadata(&self.root).await {
            Ok(metadata) if metadata.is_dir() => metadata,
            Ok(_) => exn::bail!(ErrorKind::Importer(format!("scan root is not a directory: {}", self.directory))),
            Err(e) => exn::bail!(ErrorKind::Importer(format!("cannot scan {}: {e}", self.directory))),
        };
        if results.send(Self::record(&self.directory, self.root.clone(), &metadata)).await.is_err() {
            return Ok(());
        }

        let mut stack = vec![(self.directory.clone(), self.root.clone())];
        while let Some((current, local)) = stack.pop() {
            let listed = match Self::list(&current, &local).await {
                Ok(listed) => listed,
                Err(e) => {
                    if results.send(ScanError::new(current, e).into()).await.is_err() {
                        return Ok(());
                    }
                    continue;
                },
            };
            let mut lookups = futures::stream::iter(listed).map(Self::lookup).buffer_unordered(self.max_concurrency);
            while let Some((result, descend)) = lookups.next().await {
                stack.extend(descend);
                if results.send(result).await.is_err() {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}
