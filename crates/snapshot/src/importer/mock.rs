//! In-memory importer for testing.

use super::{FileInfo, FileKind, Importer, ImporterInfo, LazyReader, ScanRecord, ScanResult};
use crate::error::Result;
use crate::path;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::io;
use tokio::sync::mpsc;

/// A file (or directory) served by a [`MockImporter`].
#[derive(Debug, Clone)]
pub struct MockFile {
    /// Path relative to the importer root.
    pub path: String,
    pub mode: u32,
    pub kind: FileKind,
    pub content: Vec<u8>,
}

impl MockFile {
    /// A regular file. A mode without any read bit makes its content
    /// unreadable, like a permission-denied file on disk.
    pub fn new(path: impl Into<String>, mode: u32, content: impl Into<Vec<u8>>) -> Self {
        Self { path: path.into(), mode, kind: FileKind::Regular, content: content.into() }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self { path: path.into(), mode: 0o755, kind: FileKind::Directory, content: Vec::new() }
    }

    fn readable(&self) -> bool {
        self.mode & 0o444 != 0
    }
}

type Generator = Box<dyn Fn() -> Vec<ScanResult> + Send + Sync>;

/// Importer replaying a fixed list of files, or whatever a generator
/// function produces.
///
/// # Examples
///
/// ```
/// use coffer_snapshot::importer::{Importer, MockFile, MockImporter};
///
/// let importer = MockImporter::new([
///     MockFile::new("hello.txt", 0o644, "hello world!\n"),
///     MockFile::new("unreadable", 0, "wooo\n"),
/// ]);
/// assert_eq!(importer.info().directory, "/");
/// ```
pub struct MockImporter {
    root: String,
    generator: Generator,
}

impl MockImporter {
    /// Serve `files` below `/`, emitting the root and every intermediate
    /// directory before the entries inside it.
    pub fn new(files: impl IntoIterator<Item = MockFile>) -> Self {
        let files: Vec<MockFile> = files.into_iter().collect();
        let generator = move || Self::generate(&files);
        Self { root: "/".to_string(), generator: Box::new(generator) }
    }

    /// Serve whatever `generator` returns, verbatim, rooted at `root`.
    pub fn with_generator<F>(root: impl Into<String>, generator: F) -> Self
    where
        F: Fn() -> Vec<ScanResult> + Send + Sync + 'static,
    {
        Self { root: root.into(), generator: Box::new(generator) }
    }

    fn generate(files: &[MockFile]) -> Vec<ScanResult> {
        let mut results = vec![ScanRecord::new("/", FileInfo::directory("/")).into()];
        let mut emitted = BTreeSet::from(["/".to_string()]);
        for file in files {
            let Some(full) = path::normalize(&format!("/{}", file.path)) else {
                continue;
            };
            let mut missing: Vec<&str> = path::ancestors(&full).take_while(|a| !emitted.contains(*a)).collect();
            missing.reverse();
            for directory in missing {
                results.push(ScanRecord::new(directory, FileInfo::directory(path::file_name(directory))).into());
                emitted.insert(directory.to_string());
            }
            let name = path::file_name(&full);
            let record = match file.kind {
                FileKind::Directory => {
                    emitted.insert(full.clone());
                    ScanRecord::new(full.clone(), FileInfo::directory(name).with_mode(file.mode))
                },
                kind => {
                    let info = FileInfo { size: file.content.len() as u64, ..FileInfo::new(name, kind) }.with_mode(file.mode);
                    let reader = match file.readable() {
                        true => LazyReader::from_bytes(file.content.clone()),
                        false => LazyReader::new(|| Err::<io::Empty, _>(io::Error::from(io::ErrorKind::PermissionDenied))),
                    };
                    ScanRecord::new(full.clone(), info).with_reader(reader)
                },
            };
            results.push(record.into());
        }
        results
    }
}

#[async_trait]
impl Importer for MockImporter {
    fn info(&self) -> ImporterInfo {
        ImporterInfo { kind: "mock".to_string(), origin: "mock".to_string(), directory: self.root.clone() }
    }

    async fn scan(&self, results: mpsc::Sender<ScanResult>) -> Result<()> {
        for result in (self.generator)() {
            if results.send(result).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}
