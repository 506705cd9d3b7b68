//! Reading snapshots back.

use crate::error::{ErrorKind, Result};
use crate::filesystem::Filesystem;
use crate::header::Header;
use crate::tree::Tree;
use coffer_envelope::{Mac, ResourceType};
use coffer_repository::Repository;
use exn::ResultExt;

/// A stored snapshot header, bound to the repository it was loaded from.
pub struct Snapshot<'r> {
    repository: &'r Repository,
    header: Header,
}

impl<'r> Snapshot<'r> {
    /// Identifiers of every snapshot in the repository.
    pub async fn list(repository: &Repository) -> Result<Vec<Mac>> {
        repository.list_blobs(ResourceType::Snapshot).await.or_raise(|| ErrorKind::Repository)
    }

    #[tracing::instrument(skip(repository))]
    pub async fn load(repository: &'r Repository, identifier: &Mac) -> Result<Self> {
        let bytes = match repository.get_blob(ResourceType::Snapshot, identifier).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return Err(e.raise(ErrorKind::NotFound(format!("snapshot {identifier}")))),
            Err(e) => return Err(e.raise(ErrorKind::Repository)),
        };
        let header: Header =
            serde_json::from_slice(&bytes).or_raise(|| ErrorKind::Corrupted(format!("snapshot {identifier}")))?;
        if header.identifier != *identifier {
            exn::bail!(ErrorKind::Corrupted(format!("snapshot {identifier} is stored under the wrong identifier")));
        }
        Ok(Self { repository, header })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn identifier(&self) -> Mac {
        self.header.identifier
    }

    /// Read-only view over the tree of the first source.
    pub async fn filesystem(&self) -> Result<Filesystem<'r>> {
        self.source_filesystem(0).await
    }

    pub async fn source_filesystem(&self, index: usize) -> Result<Filesystem<'r>> {
        let Some(source) = self.header.source(index) else {
            exn::bail!(ErrorKind::NotFound(format!("source #{index} of snapshot {}", self.header.identifier)));
        };
        let bytes = self.repository.get_blob(ResourceType::Vfs, &source.tree).await.or_raise(|| ErrorKind::Repository)?;
        if !self.repository.compute_mac(&bytes).verify(&source.tree) {
            exn::bail!(ErrorKind::Corrupted(format!("tree {}", source.tree)));
        }
        let tree: Tree = serde_json::from_slice(&bytes).or_raise(|| ErrorKind::Corrupted(format!("tree {}", source.tree)))?;
        Ok(Filesystem::new(self.repository, tree))
    }
}
