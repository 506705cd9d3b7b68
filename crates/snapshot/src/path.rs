//! Slash-separated absolute path helpers.
//!
//! Snapshot paths are plain strings: absolute, `/`-separated, no trailing
//! slash (except the root itself) and no `.`/`..` components. Every ancestor
//! walk in the builder is derived from the string, never from stored links.

/// Normalize an absolute path. Returns `None` for relative paths.
///
/// ```
/// use coffer_snapshot::path::normalize;
/// assert_eq!(normalize("/a//b/./c/").as_deref(), Some("/a/b/c"));
/// assert_eq!(normalize("/a/../../b").as_deref(), Some("/b"));
/// assert_eq!(normalize("relative"), None);
/// ```
pub fn normalize(path: &str) -> Option<String> {
    if !path.starts_with('/') {
        return None;
    }
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {},
            ".." => {
                parts.pop();
            },
            part => parts.push(part),
        }
    }
    Some(format!("/{}", parts.join("/")))
}

/// Parent of a normalized path; `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(index) => Some(&path[..index]),
        None => None,
    }
}

/// Strict ancestors of a normalized path, nearest first, ending with `/`.
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(parent(path), |current| parent(*current))
}

/// Last component of a normalized path (`/` for the root).
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) if path.len() > 1 => &path[index + 1..],
        _ => path,
    }
}

/// `true` if `path` is `root` or lies below it.
pub fn is_within(root: &str, path: &str) -> bool {
    if root == "/" {
        return path.starts_with('/');
    }
    path == root || (path.starts_with(root) && path.as_bytes().get(root.len()) == Some(&b'/'))
}

/// Path of `path` relative to `root`, as an absolute path (`/` for the root
/// itself). Assumes [`is_within`].
pub fn relative<'a>(root: &str, path: &'a str) -> &'a str {
    if root == "/" {
        return path;
    }
    match &path[root.len().min(path.len())..] {
        "" => "/",
        rest => rest,
    }
}

/// Join a normalized base path and a relative one.
pub fn join(base: &str, name: &str) -> Option<String> {
    normalize(&format!("{base}/{name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/", "/")]
    #[case("/a", "/a")]
    #[case("/a/", "/a")]
    #[case("//a///b", "/a/b")]
    #[case("/a/./b/..", "/a")]
    #[case("/..", "/")]
    fn normalization(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize(input).unwrap(), expected);
    }

    #[rstest]
    #[case("/", None)]
    #[case("/a", Some("/"))]
    #[case("/a/b", Some("/a"))]
    #[case("/a/b/c", Some("/a/b"))]
    fn parents(#[case] path: &str, #[case] expected: Option<&str>) {
        assert_eq!(parent(path), expected);
    }

    #[test]
    fn ancestor_walk() {
        assert_eq!(ancestors("/a/b/c").collect::<Vec<_>>(), vec!["/a/b", "/a", "/"]);
        assert_eq!(ancestors("/").count(), 0);
    }

    #[test]
    fn names() {
        assert_eq!(file_name("/a/b.txt"), "b.txt");
        assert_eq!(file_name("/a"), "a");
        assert_eq!(file_name("/"), "/");
    }

    #[rstest]
    #[case("/", "/anything", true)]
    #[case("/tmp", "/tmp", true)]
    #[case("/tmp", "/tmp/x", true)]
    #[case("/tmp", "/tmpx", false)]
    #[case("/tmp", "/", false)]
    fn containment(#[case] root: &str, #[case] path: &str, #[case] expected: bool) {
        assert_eq!(is_within(root, path), expected);
    }

    #[test]
    fn relative_paths() {
        assert_eq!(relative("/", "/a/b"), "/a/b");
        assert_eq!(relative("/tmp/scan", "/tmp/scan/a/b"), "/a/b");
        assert_eq!(relative("/tmp/scan", "/tmp/scan"), "/");
        assert_eq!(join("/a", "b/../c").unwrap(), "/a/c");
    }
}
