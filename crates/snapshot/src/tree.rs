//! Records persisted for a snapshot's directory tree.
//!
//! Directory, filename and file-summary records go to the repository cache,
//! one per path; the [`Tree`] index gathers all of them into a single `vfs`
//! blob on the storage backend.

use crate::importer::{FileInfo, FileKind};
use crate::summary::Summary;
use coffer_envelope::Mac;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub path: String,
    pub info: FileInfo,
    pub summary: Summary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub info: FileInfo,
    /// Content address; `None` when the importer supplied no content.
    pub object: Option<Mac>,
}

/// Condensed view of a [`FileEntry`], cached for quick stat-like lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub kind: FileKind,
    pub size: u64,
    pub mode: u32,
    pub object: Option<Mac>,
}

impl From<&FileEntry> for FileSummary {
    fn from(entry: &FileEntry) -> Self {
        Self { kind: entry.info.kind, size: entry.info.size, mode: entry.info.mode, object: entry.object }
    }
}

/// Tree index: every directory and file of one source, sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub root: String,
    pub directories: Vec<DirectoryEntry>,
    pub files: Vec<FileEntry>,
}
