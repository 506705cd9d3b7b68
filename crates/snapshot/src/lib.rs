//! Snapshot construction for coffer repositories.
//!
//! An [`Importer`](importer::Importer) pushes scan results onto a bounded
//! queue; the [`Builder`] consumes them, stores file content through the
//! repository, and aggregates per-directory statistics that never abort on
//! individual failures. The finished tree is persisted as a `vfs` blob and
//! described by a [`Header`] stored as a `snapshot` blob.
//!
//! ```no_run
//! use coffer_snapshot::importer::FsImporter;
//! use coffer_snapshot::{Builder, Snapshot};
//!
//! # async fn example(repository: &coffer_repository::Repository) -> coffer_snapshot::error::Result<()> {
//! let importer = FsImporter::from_context("/etc", repository.context())?;
//! let header = Builder::new(repository).backup(&importer).await?;
//! let snapshot = Snapshot::load(repository, &header.identifier).await?;
//! let fs = snapshot.filesystem().await?;
//! let hosts = fs.read("hosts").await?;
//! # Ok(())
//! # }
//! ```

mod builder;
pub mod error;
mod exclude;
mod filesystem;
mod header;
pub mod importer;
pub mod path;
mod snapshot;
mod summary;
mod tree;

pub use crate::builder::{Builder, State};
pub use crate::exclude::Excludes;
pub use crate::filesystem::{File, Filesystem, Stat};
pub use crate::header::{Header, Source};
pub use crate::snapshot::Snapshot;
pub use crate::summary::{DirectorySummary, Summary};
pub use crate::tree::{DirectoryEntry, FileEntry, FileSummary, Tree};
