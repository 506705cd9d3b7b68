use crate::importer::FileKind;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Counters for the entries of one directory level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorySummary {
    pub files: u64,
    pub directories: u64,
    pub symlinks: u64,
    pub others: u64,
    pub errors: u64,
    /// Sum of the sizes of regular files, symlinks and others.
    pub size: u64,
}

impl DirectorySummary {
    /// Count one committed entry of `kind`.
    pub fn record(&mut self, kind: FileKind, size: u64) {
        match kind {
            FileKind::Directory => self.directories += 1,
            FileKind::Regular => self.files += 1,
            FileKind::Symlink => self.symlinks += 1,
            FileKind::Other => self.others += 1,
        }
        if kind != FileKind::Directory {
            self.size += size;
        }
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    /// Number of entries counted, errors included.
    pub fn entries(&self) -> u64 {
        self.files + self.directories + self.symlinks + self.others + self.errors
    }
}

impl AddAssign for DirectorySummary {
    fn add_assign(&mut self, other: Self) {
        self.files += other.files;
        self.directories += other.directories;
        self.symlinks += other.symlinks;
        self.others += other.others;
        self.errors += other.errors;
        self.size += other.size;
    }
}

/// Statistics of one directory: its own entries (`directory`) and the
/// cumulative counters of every directory strictly below it (`below`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub directory: DirectorySummary,
    pub below: DirectorySummary,
}

impl Summary {
    /// Counters for the whole subtree: own entries plus everything below.
    pub fn total(&self) -> DirectorySummary {
        let mut total = self.directory;
        total += self.below;
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_by_kind() {
        let mut summary = DirectorySummary::default();
        summary.record(FileKind::Regular, 10);
        summary.record(FileKind::Directory, 4096);
        summary.record(FileKind::Symlink, 3);
        summary.record(FileKind::Other, 0);
        summary.record_error();
        assert_eq!(summary.files, 1);
        assert_eq!(summary.directories, 1);
        assert_eq!(summary.symlinks, 1);
        assert_eq!(summary.others, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.size, 13);
        assert_eq!(summary.entries(), 5);
    }

    #[test]
    fn total_adds_levels() {
        let summary = Summary {
            directory: DirectorySummary { files: 2, directories: 1, ..Default::default() },
            below: DirectorySummary { files: 5, errors: 3, size: 7, ..Default::default() },
        };
        let total = summary.total();
        assert_eq!(total.files, 7);
        assert_eq!(total.directories, 1);
        assert_eq!(total.errors, 3);
        assert_eq!(total.size, 7);
    }
}
