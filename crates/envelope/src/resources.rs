//! Resource types that can be wrapped in an envelope.
//!
//! The numeric tag is part of the wire format and must never be reused for a
//! different kind of resource.

use derive_more::Display;

/// Kind of resource carried by an envelope.
///
/// Storage backends and the cache are also addressed by resource type, so the
/// string form ([`as_str`](Self::as_str)) doubles as a stable on-disk category.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum ResourceType {
    /// Repository configuration record.
    #[display("config")]
    Config = 1,
    /// Snapshot header.
    #[display("snapshot")]
    Snapshot = 2,
    /// Persisted tree index of a snapshot.
    #[display("vfs")]
    Vfs = 3,
    /// Directory entry (metadata and summary).
    #[display("directory")]
    Directory = 4,
    /// File entry referencing its content address.
    #[display("filename")]
    Filename = 5,
    /// Compact per-file summary.
    #[display("file-summary")]
    FileSummary = 6,
    /// Content-addressed object bytes.
    #[display("object")]
    Object = 7,
}

impl ResourceType {
    pub const ALL: [ResourceType; 7] = [
        Self::Config,
        Self::Snapshot,
        Self::Vfs,
        Self::Directory,
        Self::Filename,
        Self::FileSummary,
        Self::Object,
    ];

    /// Numeric tag written into the envelope header.
    pub const fn tag(self) -> u32 {
        self as u32
    }

    /// Look up a resource type from its wire tag.
    pub fn from_tag(tag: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|rt| rt.tag() == tag)
    }

    /// Stable string tag.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Snapshot => "snapshot",
            Self::Vfs => "vfs",
            Self::Directory => "directory",
            Self::Filename => "filename",
            Self::FileSummary => "file-summary",
            Self::Object => "object",
        }
    }
}
