//! Snapshot construction.
//!
//! The [`Builder`] is the single consumer of an importer's queue. It keeps an
//! arena of directory nodes keyed by normalized path and derives every
//! ancestor walk from the path string, so results may arrive in any order.
//!
//! Counting rule: an entry at `P` is counted on the own summary of
//! `parent(P)` and on the `below` summary of every strict ancestor of
//! `parent(P)` up to the scan root. A directory's `below` is therefore the
//! sum of the own counters of its strict descendants, and its subtree total
//! is [`Summary::total`].

use crate::error::{ErrorKind, Result};
use crate::exclude::Excludes;
use crate::header::{Header, Source};
use crate::importer::{FileInfo, FileKind, Importer, ImporterInfo, LazyReader, ScanRecord, ScanResult};
use crate::path;
use crate::summary::{DirectorySummary, Summary};
use crate::tree::{DirectoryEntry, FileEntry, FileSummary, Tree};
use coffer_envelope::{Mac, ResourceType};
use coffer_repository::Repository;
use derive_more::Display;
use exn::ResultExt;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Display, PartialEq, Eq)]
pub enum State {
    #[display("collecting")]
    Collecting,
    #[display("finalizing")]
    Finalizing,
    #[display("done")]
    Done,
    #[display("aborted")]
    Aborted,
}

impl State {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Collecting => "collecting",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }
}

#[derive(Debug)]
struct Node {
    info: FileInfo,
    summary: Summary,
    /// Whether a record for this directory was committed (and counted).
    /// Implicit ancestors stay `false`.
    recorded: bool,
}

impl Node {
    fn implicit(path: &str) -> Self {
        Self { info: FileInfo::directory(path::file_name(path)), summary: Summary::default(), recorded: false }
    }
}

/// Builds one snapshot from one importer.
///
/// # Examples
///
/// ```no_run
/// use coffer_snapshot::Builder;
/// use coffer_snapshot::importer::FsImporter;
///
/// # async fn example(repository: &coffer_repository::Repository) -> coffer_snapshot::error::Result<()> {
/// let importer = FsImporter::from_context("/home/user/documents", repository.context())?;
/// let mut builder = Builder::new(repository).with_excludes(["*.tmp", "/cache"])?;
/// let header = builder.backup(&importer).await?;
/// println!("{} files", header.sources[0].summary.total().files);
/// # Ok(())
/// # }
/// ```
pub struct Builder<'r> {
    repository: &'r Repository,
    identifier: Mac,
    excludes: Excludes,
    state: State,
    root: String,
    directories: BTreeMap<String, Node>,
    files: BTreeMap<String, FileEntry>,
}

impl<'r> Builder<'r> {
    pub fn new(repository: &'r Repository) -> Self {
        Self {
            repository,
            identifier: Mac::from_bytes(rand::random()),
            excludes: Excludes::default(),
            state: State::Collecting,
            root: "/".to_string(),
            directories: BTreeMap::new(),
            files: BTreeMap::new(),
        }
    }

    /// Skip entries matching any of `patterns`; see [`Excludes`].
    pub fn with_excludes<I, S>(mut self, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excludes = Excludes::new(patterns)?;
        Ok(self)
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Identifier the header will be stored under.
    pub fn identifier(&self) -> Mac {
        self.identifier
    }

    /// Scan `importer` to completion and persist the snapshot.
    ///
    /// Per-entry failures only show up as error counters. A cache or storage
    /// failure aborts the snapshot and is returned. Cancelling the
    /// repository context stops consuming and finalizes whatever was
    /// committed so far.
    #[tracing::instrument(skip_all, fields(snapshot = %self.identifier))]
    pub async fn backup(&mut self, importer: &dyn Importer) -> Result<Header> {
        if self.state != State::Collecting {
            exn::bail!(ErrorKind::InvalidState(self.state.as_str()));
        }
        match self.run(importer).await {
            Ok(header) => Ok(header),
            Err(e) => {
                tracing::error!(error = ?e, "Snapshot aborted");
                self.transition(State::Aborted);
                self.directories.clear();
                self.files.clear();
                Err(e)
            },
        }
    }

    async fn run(&mut self, importer: &dyn Importer) -> Result<Header> {
        let info = importer.info();
        let Some(root) = path::normalize(&info.directory) else {
            exn::bail!(ErrorKind::Importer(format!("scan root must be absolute: {}", info.directory)));
        };
        tracing::info!(importer = %info.kind, origin = %info.origin, root = %root, "Collecting");
        self.root = root;
        let root = self.root.clone();
        self.node(&root);

        let cancel = self.repository.context().cancellation().clone();
        let capacity = self.repository.context().settings().queue_capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let (scanned, collected) = tokio::join!(importer.scan(tx), self.collect(rx, &cancel));
        collected?;
        scanned?;
        self.finalize(info).await
    }

    async fn collect(&mut self, mut results: mpsc::Receiver<ScanResult>, cancel: &CancellationToken) -> Result<()> {
        loop {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::info!("Cancelled, finalizing what was collected");
                    return Ok(());
                },
                result = results.recv() => match result {
                    Some(result) => result,
                    None => return Ok(()),
                },
            };
            self.ingest(result, cancel).await?;
        }
    }

    async fn ingest(&mut self, result: ScanResult, cancel: &CancellationToken) -> Result<()> {
        let Some(path) = path::normalize(result.path()).filter(|p| path::is_within(&self.root, p)) else {
            tracing::warn!(path = result.path(), root = %self.root, "Ignoring result outside the scan root");
            return Ok(());
        };
        if self.excludes.is_excluded(path::relative(&self.root, &path)) {
            tracing::trace!(%path, "Excluded");
            return Ok(());
        }
        match result {
            ScanResult::Error(error) => {
                tracing::warn!(%path, error = %error.error, "Scan error");
                self.record_error(&path);
            },
            ScanResult::Record(record) if record.info.is_dir() => self.record_directory(path, record.info),
            ScanResult::Record(_) if path == self.root => {
                tracing::warn!(%path, "Scan root is not a directory, ignoring");
            },
            ScanResult::Record(record) => self.record_file(path, record, cancel).await?,
        }
        Ok(())
    }

    fn record_error(&mut self, path: &str) {
        match path::parent(path).filter(|_| path != self.root) {
            Some(parent) => self.propagate(parent, DirectorySummary::record_error),
            None => {
                let root = self.root.clone();
                self.node(&root).summary.directory.record_error();
            },
        }
    }

    fn record_directory(&mut self, path: String, info: FileInfo) {
        let node = self.node(&path);
        let first = !node.recorded;
        node.info = info;
        node.recorded = true;
        if !first {
            tracing::debug!(%path, "Duplicate directory record");
            return;
        }
        if path == self.root {
            return;
        }
        if let Some(parent) = path::parent(&path) {
            self.propagate(parent, |summary| summary.record(FileKind::Directory, 0));
        }
    }

    async fn record_file(&mut self, path: String, record: ScanRecord, cancel: &CancellationToken) -> Result<()> {
        let ScanRecord { info, reader, .. } = record;
        let object = match reader {
            Some(reader) => match read_content(reader, cancel).await {
                Ok(content) => Some(self.repository.put_object(&content).await.or_raise(|| ErrorKind::Persist)?),
                Err(_) if cancel.is_cancelled() => {
                    tracing::debug!(%path, "Read interrupted by cancellation");
                    return Ok(());
                },
                Err(e) => {
                    tracing::warn!(%path, error = %e, "Cannot read content");
                    self.record_error(&path);
                    return Ok(());
                },
            },
            None => None,
        };

        let entry = FileEntry { path, info, object };
        self.persist_file(&entry).await?;
        let (kind, size) = (entry.info.kind, entry.info.size);
        let path = entry.path.clone();
        if self.files.insert(path.clone(), entry).is_some() {
            tracing::debug!(%path, "Duplicate file record");
            return Ok(());
        }
        if let Some(parent) = path::parent(&path) {
            self.propagate(parent, |summary| summary.record(kind, size));
        }
        Ok(())
    }

    /// Count on `parent`'s own summary and on `below` of its strict
    /// ancestors inside the scan root.
    fn propagate(&mut self, parent: &str, apply: impl Fn(&mut DirectorySummary)) {
        apply(&mut self.node(parent).summary.directory);
        let root = self.root.clone();
        for ancestor in path::ancestors(parent).take_while(|a| path::is_within(&root, a)) {
            apply(&mut self.node(ancestor).summary.below);
        }
    }

    /// Node for `path`, created uncounted if this is the first time it's seen.
    fn node(&mut self, path: &str) -> &mut Node {
        self.directories.entry(path.to_string()).or_insert_with(|| Node::implicit(path))
    }

    fn cache_key(&self, path: &str) -> String {
        format!("{}:{path}", self.identifier)
    }

    fn encode<T: Serialize>(&self, resource: ResourceType, value: &T) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(value).or_raise(|| ErrorKind::Persist)?;
        Ok(self.repository.seal(resource, &json))
    }

    async fn persist_file(&self, entry: &FileEntry) -> Result<()> {
        let cache = self.repository.cache();
        let key = self.cache_key(&entry.path);
        let record = self.encode(ResourceType::Filename, entry)?;
        cache.put_filename(&key, &record).await.or_raise(|| ErrorKind::Persist)?;
        let summary = self.encode(ResourceType::FileSummary, &FileSummary::from(entry))?;
        cache.put_file_summary(&key, &summary).await.or_raise(|| ErrorKind::Persist)
    }

    async fn finalize(&mut self, importer: ImporterInfo) -> Result<Header> {
        self.transition(State::Finalizing);
        let cache = self.repository.cache();

        let mut directories = Vec::with_capacity(self.directories.len());
        for (path, node) in &self.directories {
            let entry = DirectoryEntry { path: path.clone(), info: node.info.clone(), summary: node.summary };
            let record = self.encode(ResourceType::Directory, &entry)?;
            cache.put_directory(&self.cache_key(path), &record).await.or_raise(|| ErrorKind::Persist)?;
            directories.push(entry);
        }
        let summary = self.directories.get(&self.root).map(|node| node.summary).unwrap_or_default();
        let tree = Tree {
            root: self.root.clone(),
            directories,
            files: std::mem::take(&mut self.files).into_values().collect(),
        };
        self.directories.clear();

        let tree_bytes = serde_json::to_vec(&tree).or_raise(|| ErrorKind::Persist)?;
        let tree_mac = self.repository.compute_mac(&tree_bytes);
        self.repository.put_blob(ResourceType::Vfs, &tree_mac, &tree_bytes).await.or_raise(|| ErrorKind::Persist)?;

        let header = Header {
            identifier: self.identifier,
            timestamp: OffsetDateTime::now_utc(),
            client: self.repository.context().settings().client.clone(),
            sources: vec![Source { importer, summary, tree: tree_mac }],
        };
        let header_bytes = serde_json::to_vec(&header).or_raise(|| ErrorKind::Persist)?;
        self.repository
            .put_blob(ResourceType::Snapshot, &header.identifier, &header_bytes)
            .await
            .or_raise(|| ErrorKind::Persist)?;

        let total = summary.total();
        tracing::info!(
            files = total.files,
            directories = total.directories,
            errors = total.errors,
            size = total.size,
            tree = %tree_mac,
            "Snapshot stored",
        );
        self.transition(State::Done);
        Ok(header)
    }

    fn transition(&mut self, next: State) {
        tracing::debug!(from = %self.state, to = %next, "State transition");
        self.state = next;
    }
}

/// Read a whole content handle off the async runtime. The handle is dropped
/// by the blocking task whichever way the read ends.
async fn read_content(mut reader: LazyReader, cancel: &CancellationToken) -> io::Result<Vec<u8>> {
    let token = cancel.clone();
    let read = tokio::task::spawn_blocking(move || reader.read_all(&token));
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(io::Error::from(io::ErrorKind::Interrupted)),
        joined = read => joined.unwrap_or_else(|e| Err(io::Error::other(e))),
    }
}
