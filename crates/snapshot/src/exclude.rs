//! Exclusion patterns.
//!
//! Patterns starting with `/` are anchored at the scan root (`/cache` only
//! matches the top-level `cache`); any other pattern matches at every depth
//! (`*.tmp`). A match on a directory excludes its whole subtree.

use crate::error::{ErrorKind, Result};
use crate::path;
use exn::ResultExt;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

#[derive(Debug, Clone)]
pub struct Excludes {
    set: GlobSet,
    patterns: Vec<String>,
}

impl Default for Excludes {
    fn default() -> Self {
        Self { set: GlobSet::empty(), patterns: Vec::new() }
    }
}

impl Excludes {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            let anchored = match pattern.strip_prefix('/') {
                Some(rest) => format!("/{}", rest.trim_end_matches('/')),
                None => format!("**/{}", pattern.trim_end_matches('/')),
            };
            let glob = GlobBuilder::new(&anchored)
                .literal_separator(true)
                .build()
                .or_raise(|| ErrorKind::Pattern(pattern.to_string()))?;
            builder.add(glob);
            kept.push(pattern.to_string());
        }
        let set = builder.build().or_raise(|| ErrorKind::Pattern(kept.join(", ")))?;
        Ok(Self { set, patterns: kept })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// `relative` is the entry path relative to the scan root, in absolute
    /// form. The root itself is never excluded.
    pub fn is_excluded(&self, relative: &str) -> bool {
        if self.is_empty() || relative == "/" {
            return false;
        }
        std::iter::once(relative)
            .chain(path::ancestors(relative))
            .take_while(|candidate| *candidate != "/")
            .any(|candidate| self.set.is_match(candidate))
    }
}
