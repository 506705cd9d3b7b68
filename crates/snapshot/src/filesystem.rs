//! Read-only filesystem view over a persisted snapshot tree.
//!
//! Paths are resolved against a working root set with
//! [`chroot`](Filesystem::chroot); `..` never climbs above it. Initially the
//! working root is the scan root of the source.

use crate::error::{ErrorKind, Result};
use crate::importer::FileInfo;
use crate::path;
use crate::summary::Summary;
use crate::tree::{DirectoryEntry, FileEntry, Tree};
use coffer_repository::Repository;
use exn::ResultExt;
use std::collections::BTreeMap;
use std::io::{self, Read};

/// Metadata of one entry of the tree.
#[derive(Debug, Clone, Copy)]
pub enum Stat<'a> {
    Directory(&'a DirectoryEntry),
    File(&'a FileEntry),
}

impl<'a> Stat<'a> {
    pub fn path(&self) -> &'a str {
        match self {
            Self::Directory(entry) => &entry.path,
            Self::File(entry) => &entry.path,
        }
    }

    pub fn info(&self) -> &'a FileInfo {
        match self {
            Self::Directory(entry) => &entry.info,
            Self::File(entry) => &entry.info,
        }
    }

    /// Directory summary; `None` for files.
    pub fn summary(&self) -> Option<&'a Summary> {
        match self {
            Self::Directory(entry) => Some(&entry.summary),
            Self::File(_) => None,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory(_))
    }
}

/// Content of an opened file.
#[derive(Debug)]
pub struct File {
    info: FileInfo,
    content: io::Cursor<Vec<u8>>,
}

impl File {
    pub fn info(&self) -> &FileInfo {
        &self.info
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.content.into_inner()
    }
}

impl Read for File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.content.read(buf)
    }
}

pub struct Filesystem<'r> {
    repository: &'r Repository,
    cwd: String,
    directories: BTreeMap<String, DirectoryEntry>,
    files: BTreeMap<String, FileEntry>,
}

impl<'r> Filesystem<'r> {
    pub(crate) fn new(repository: &'r Repository, tree: Tree) -> Self {
        Self {
            repository,
            cwd: tree.root,
            directories: tree.directories.into_iter().map(|entry| (entry.path.clone(), entry)).collect(),
            files: tree.files.into_iter().map(|entry| (entry.path.clone(), entry)).collect(),
        }
    }

    /// Current working root.
    pub fn root(&self) -> &str {
        &self.cwd
    }

    /// Confine every later lookup to the directory at `path`.
    pub fn chroot(&mut self, path: &str) -> Result<()> {
        let resolved = self.resolve(path);
        if !self.lookup(&resolved)?.is_dir() {
            exn::bail!(ErrorKind::NotADirectory(resolved));
        }
        self.cwd = resolved;
        Ok(())
    }

    pub fn stat(&self, path: &str) -> Result<Stat<'_>> {
        self.lookup(&self.resolve(path))
    }

    /// Entries directly inside the directory at `path`, sorted by path.
    pub fn read_dir(&self, path: &str) -> Result<Vec<Stat<'_>>> {
        let resolved = self.resolve(path);
        if let Stat::File(_) = self.lookup(&resolved)? {
            exn::bail!(ErrorKind::NotADirectory(resolved));
        }
        let is_child = |candidate: &str| candidate != resolved && path::parent(candidate) == Some(resolved.as_str());
        let mut entries: Vec<Stat<'_>> = self
            .directories
            .values()
            .filter(|entry| is_child(&entry.path))
            .map(Stat::Directory)
            .chain(self.files.values().filter(|entry| is_child(&entry.path)).map(Stat::File))
            .collect();
        entries.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(entries)
    }

    /// Fetch the content of the file at `path` from the repository.
    pub async fn open(&self, path: &str) -> Result<File> {
        let resolved = self.resolve(path);
        let entry = match self.lookup(&resolved)? {
            Stat::File(entry) => entry,
            Stat::Directory(_) => exn::bail!(ErrorKind::IsADirectory(resolved)),
        };
        let content = match &entry.object {
            Some(object) => self.repository.get_object(object).await.or_raise(|| ErrorKind::Repository)?,
            None => Vec::new(),
        };
        Ok(File { info: entry.info.clone(), content: io::Cursor::new(content) })
    }

    pub async fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(self.open(path).await?.into_bytes())
    }

    fn resolve(&self, path: &str) -> String {
        let inner = path::normalize(&format!("/{path}")).unwrap_or_else(|| "/".to_string());
        if inner == "/" {
            return self.cwd.clone();
        }
        match self.cwd.as_str() {
            "/" => inner,
            cwd => format!("{cwd}{inner}"),
        }
    }

    fn lookup(&self, resolved: &str) -> Result<Stat<'_>> {
        if let Some(entry) = self.directories.get(resolved) {
            return Ok(Stat::Directory(entry));
        }
        match self.files.get(resolved) {
            Some(entry) => Ok(Stat::File(entry)),
            None => exn::bail!(ErrorKind::NotFound(resolved.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Builder;
    use crate::importer::{MockFile, MockImporter};
    use coffer_config::Settings;
    use coffer_envelope::Mac;
    use coffer_repository::{Configuration, Context};
    use coffer_storage::BackendHandle;
    use coffer_storage::backend::MockBackend;
    use std::sync::Arc;

    async fn repository(temp_dir: &tempfile::TempDir) -> Repository {
        let backend: BackendHandle = Arc::new(MockBackend::default());
        Repository::create(&backend, &Configuration::new()).await.unwrap();
        let ctx = Context::new(Settings::with_cache_dir(temp_dir.path())).with_ephemeral_cache(true);
        let Ok(repository) = Repository::open(ctx, backend, None).await else {
            panic!("repository should open");
        };
        repository
    }

    async fn snapshot(repository: &Repository) -> Mac {
        let importer = MockImporter::new([
            MockFile::new("etc/motd", 0o644, "welcome\n"),
            MockFile::new("etc/conf.d/net", 0o600, "dhcp"),
            MockFile::new("README", 0o644, ""),
        ]);
        Builder::new(repository).backup(&importer).await.unwrap().identifier
    }

    #[tokio::test]
    async fn stat_and_read_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let repository = repository(&temp_dir).await;
        let identifier = snapshot(&repository).await;
        let snapshot = crate::Snapshot::load(&repository, &identifier).await.unwrap();
        let fs = snapshot.filesystem().await.unwrap();

        let etc = fs.stat("/etc").unwrap();
        assert!(etc.is_dir());
        assert_eq!(etc.summary().unwrap().directory.files, 1);
        assert_eq!(etc.summary().unwrap().below.files, 1);

        let names: Vec<&str> = fs.read_dir("/etc").unwrap().iter().map(Stat::path).collect();
        assert_eq!(names, vec!["/etc/conf.d", "/etc/motd"]);
        let names: Vec<&str> = fs.read_dir("/").unwrap().iter().map(Stat::path).collect();
        assert_eq!(names, vec!["/README", "/etc"]);

        assert_eq!(fs.stat("etc/conf.d/net").unwrap().info().mode, 0o600);
        assert!(fs.stat("/missing").unwrap_err().is_not_found());
        assert!(matches!(&*fs.read_dir("/README").unwrap_err(), ErrorKind::NotADirectory(_)));
    }

    #[tokio::test]
    async fn chroot_confines_lookups() {
        let temp_dir = tempfile::tempdir().unwrap();
        let repository = repository(&temp_dir).await;
        let identifier = snapshot(&repository).await;
        let snapshot = crate::Snapshot::load(&repository, &identifier).await.unwrap();
        let mut fs = snapshot.filesystem().await.unwrap();

        fs.chroot("/etc").unwrap();
        assert_eq!(fs.root(), "/etc");
        assert_eq!(fs.read("motd").await.unwrap(), b"welcome\n");
        assert_eq!(fs.read("/conf.d/net").await.unwrap(), b"dhcp");
        assert_eq!(fs.stat("../../motd").unwrap().path(), "/etc/motd");
        assert!(fs.stat("/README").unwrap_err().is_not_found());
        assert!(matches!(&*fs.chroot("motd").unwrap_err(), ErrorKind::NotADirectory(_)));
        assert!(matches!(&*fs.open("conf.d").await.unwrap_err(), ErrorKind::IsADirectory(_)));
    }

    #[tokio::test]
    async fn empty_files_read_back_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let repository = repository(&temp_dir).await;
        let identifier = snapshot(&repository).await;
        let snapshot = crate::Snapshot::load(&repository, &identifier).await.unwrap();
        let fs = snapshot.filesystem().await.unwrap();
        let file = fs.open("README").await.unwrap();
        assert_eq!(file.info().size, 0);
        assert!(file.into_bytes().is_empty());
    }
}
