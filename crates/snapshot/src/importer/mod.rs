//! Importer contract: the producer side of a snapshot.
//!
//! An [`Importer`] walks some source and pushes one [`ScanResult`] per entry
//! onto a bounded queue. How it traverses is its own business; the builder
//! only relies on every result carrying a normalized absolute path below
//! [`ImporterInfo::directory`].

mod fs;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::fs::FsImporter;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::{MockFile, MockImporter};
use crate::error::Result;
use async_trait::async_trait;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Read};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const READ_CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    #[display("directory")]
    Directory,
    #[display("regular")]
    Regular,
    #[display("symlink")]
    Symlink,
    #[display("other")]
    Other,
}

/// Metadata of one scanned entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub kind: FileKind,
    pub size: u64,
    /// Permission bits (`0o644`).
    pub mode: u32,
    pub nlink: u64,
    pub username: String,
    pub groupname: String,
}

impl FileInfo {
    pub fn new(name: impl Into<String>, kind: FileKind) -> Self {
        Self {
            name: name.into(),
            kind,
            size: 0,
            mode: if kind == FileKind::Directory { 0o755 } else { 0o644 },
            nlink: 1,
            username: String::new(),
            groupname: String::new(),
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, FileKind::Directory)
    }

    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self { size, ..Self::new(name, FileKind::Regular) }
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_owner(mut self, username: impl Into<String>, groupname: impl Into<String>) -> Self {
        self.username = username.into();
        self.groupname = groupname.into();
        self
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }
}

type Opener = Box<dyn FnOnce() -> io::Result<Box<dyn Read + Send>> + Send>;

/// Content handle that is only opened on first read.
///
/// The underlying resource lives inside this value, so it is released
/// whenever the reader is dropped, whatever the outcome of reading.
pub struct LazyReader {
    opener: Option<Opener>,
    inner: Option<Box<dyn Read + Send>>,
}

impl LazyReader {
    pub fn new<F, R>(open: F) -> Self
    where
        F: FnOnce() -> io::Result<R> + Send + 'static,
        R: Read + Send + 'static,
    {
        let opener: Opener = Box::new(move || open().map(|reader| Box::new(reader) as Box<dyn Read + Send>));
        Self { opener: Some(opener), inner: None }
    }

    /// Reader over bytes already in memory.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        Self::new(move || Ok(io::Cursor::new(bytes)))
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// Read the whole content, giving up with [`io::ErrorKind::Interrupted`]
    /// as soon as `cancel` fires between two chunks.
    pub fn read_all(&mut self, cancel: &CancellationToken) -> io::Result<Vec<u8>> {
        let mut content = Vec::new();
        let mut chunk = vec![0; READ_CHUNK];
        loop {
            if cancel.is_cancelled() {
                return Err(io::Error::from(io::ErrorKind::Interrupted));
            }
            match self.read(&mut chunk) {
                Ok(0) => return Ok(content),
                Ok(n) => content.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
                Err(e) => return Err(e),
            }
        }
    }
}

impl Read for LazyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.inner.is_none() {
            let open = self.opener.take().ok_or_else(|| io::Error::other("content could not be opened"))?;
            self.inner = Some(open()?);
        }
        match self.inner.as_mut() {
            Some(inner) => inner.read(buf),
            None => Ok(0),
        }
    }
}

impl fmt::Debug for LazyReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyReader").field("open", &self.is_open()).finish_non_exhaustive()
    }
}

/// One successfully scanned entry.
#[derive(Debug)]
pub struct ScanRecord {
    pub path: String,
    pub info: FileInfo,
    pub reader: Option<LazyReader>,
}

impl ScanRecord {
    pub fn new(path: impl Into<String>, info: FileInfo) -> Self {
        Self { path: path.into(), info, reader: None }
    }

    pub fn with_reader(mut self, reader: LazyReader) -> Self {
        self.reader = Some(reader);
        self
    }
}

/// A path the importer could not scan.
#[derive(Debug, Display)]
#[display("{path}: {error}")]
pub struct ScanError {
    pub path: String,
    pub error: io::Error,
}

impl ScanError {
    pub fn new(path: impl Into<String>, error: io::Error) -> Self {
        Self { path: path.into(), error }
    }
}

/// Exactly one of a record or an error.
#[derive(Debug)]
pub enum ScanResult {
    Record(ScanRecord),
    Error(ScanError),
}

impl ScanResult {
    pub fn path(&self) -> &str {
        match self {
            Self::Record(record) => &record.path,
            Self::Error(error) => &error.path,
        }
    }
}

impl From<ScanRecord> for ScanResult {
    fn from(record: ScanRecord) -> Self {
        Self::Record(record)
    }
}

impl From<ScanError> for ScanResult {
    fn from(error: ScanError) -> Self {
        Self::Error(error)
    }
}

/// Description of an importer, recorded in the snapshot header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImporterInfo {
    /// Importer type (`fs`, `mock`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Host or location the scan ran against.
    pub origin: String,
    /// Scan root; every result path lies below it.
    pub directory: String,
}

#[async_trait]
pub trait Importer: Send + Sync {
    fn info(&self) -> ImporterInfo;

    /// Push every result onto `results`, returning once the source is
    /// exhausted. A closed queue means the consumer stopped; return `Ok`.
    ///
    /// Per-entry failures are sent as [`ScanResult::Error`]; only a failure to
    /// scan at all is returned as an error.
    async fn scan(&self, results: mpsc::Sender<ScanResult>) -> Result<()>;
}
