use derive_more::Display;

/// Key space of a cache entry.
///
/// The string tags are stable: they are persisted as the first column of
/// every row.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    #[display("directory")]
    Directory,
    #[display("filename")]
    Filename,
    #[display("file-summary")]
    FileSummary,
    /// Content-addressed object; keyed by lowercase hex of its [`Mac`](coffer_envelope::Mac).
    #[display("object")]
    Object,
}

impl Category {
    pub const ALL: [Self; 4] = [Self::Directory, Self::Filename, Self::FileSummary, Self::Object];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::Filename => "filename",
            Self::FileSummary => "file-summary",
            Self::Object => "object",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_tag() {
        for category in Category::ALL {
            assert_eq!(category.to_string(), category.as_str());
        }
        assert_eq!(Category::FileSummary.as_str(), "file-summary");
    }
}
