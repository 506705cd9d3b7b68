use crate::importer::ImporterInfo;
use crate::summary::Summary;
use coffer_envelope::Mac;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One scanned source of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub importer: ImporterInfo,
    /// Root directory summary: own entries plus everything below.
    pub summary: Summary,
    /// Address of the `vfs` tree index blob.
    pub tree: Mac,
}

/// Snapshot header, stored as a `snapshot` blob keyed by its identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub identifier: Mac,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub client: String,
    pub sources: Vec<Source>,
}

impl Header {
    pub fn source(&self, index: usize) -> Option<&Source> {
        self.sources.get(index)
    }
}
