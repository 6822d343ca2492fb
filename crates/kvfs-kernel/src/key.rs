//! Key model: canonical paths over delimiter-structured keys.
//!
//! A canonical path has no leading or trailing delimiter and no empty
//! segments. The root is the empty string and its prefix matches every key.
//! All functions here are pure string operations.

/// Hierarchy separator used by keys.
pub const DELIMITER: char = '/';

/// The root path.
pub const ROOT: &str = "";

/// Canonicalize a raw key or path.
///
/// Strips leading, trailing and repeated delimiters. `""` and `"/"` both
/// normalize to the root.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for segment in raw.split(DELIMITER).filter(|s| !s.is_empty()) {
        if !out.is_empty() {
            out.push(DELIMITER);
        }
        out.push_str(segment);
    }
    out
}

/// Returns true if `path` is the root.
pub fn is_root(path: &str) -> bool {
    path.is_empty()
}

/// Join a canonical parent path and a child name.
pub fn join(parent: &str, name: &str) -> String {
    let parent = normalize(parent);
    let name = normalize(name);
    match (parent.is_empty(), name.is_empty()) {
        (true, _) => name,
        (false, true) => parent,
        (false, false) => format!("{parent}{DELIMITER}{name}"),
    }
}

/// Remove the final segment. Depth-1 paths and the root return the root.
pub fn parent_of(path: &str) -> String {
    let path = normalize(path);
    match path.rfind(DELIMITER) {
        Some(idx) => path[..idx].to_string(),
        None => String::new(),
    }
}

/// Final segment of a path, `""` for the root.
pub fn last_segment(path: &str) -> &str {
    let trimmed = path.trim_end_matches(DELIMITER);
    match trimmed.rfind(DELIMITER) {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// The string every descendant key of `path` starts with.
///
/// `"a/b"` becomes `"a/b/"`; the root stays `""`.
pub fn dir_prefix(path: &str) -> String {
    let path = normalize(path);
    if path.is_empty() {
        path
    } else {
        format!("{path}{DELIMITER}")
    }
}

/// Next segment of `key` below `prefix`, and whether more segments follow.
///
/// `prefix` is a [`dir_prefix`] (empty for root, otherwise delimiter
/// terminated). Returns `None` when `key` does not start with `prefix` or
/// when nothing remains after it, which is the directory's own marker key.
pub fn first_unmatched_segment<'k>(key: &'k str, prefix: &str) -> Option<(&'k str, bool)> {
    let remainder = key.strip_prefix(prefix)?.trim_start_matches(DELIMITER);
    if remainder.is_empty() {
        return None;
    }
    match remainder.split_once(DELIMITER) {
        Some((segment, rest)) => Some((segment, !rest.trim_matches(DELIMITER).is_empty())),
        None => Some((remainder, false)),
    }
}

/// Returns true if `name` can be used as a single path segment.
pub fn is_valid_segment(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("/"), "");
        assert_eq!(normalize("///"), "");
        assert_eq!(normalize("/a/b"), "a/b");
        assert_eq!(normalize("a/b/"), "a/b");
        assert_eq!(normalize("//a//b//"), "a/b");
        assert_eq!(normalize("registry"), "registry");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("", "a"), "a");
        assert_eq!(join("/", "a"), "a");
        assert_eq!(join("a", "b"), "a/b");
        assert_eq!(join("/a/", "b"), "a/b");
        assert_eq!(join("a", ""), "a");
    }

    #[test]
    fn test_parent_of() {
        assert_eq!(parent_of("a/b/c"), "a/b");
        assert_eq!(parent_of("a"), "");
        assert_eq!(parent_of("/a/"), "");
        assert_eq!(parent_of(""), "");
    }

    #[test]
    fn test_last_segment() {
        assert_eq!(last_segment("a/b/c"), "c");
        assert_eq!(last_segment("a"), "a");
        assert_eq!(last_segment(""), "");
        assert_eq!(last_segment("a/b/"), "b");
    }

    #[test]
    fn test_dir_prefix() {
        assert_eq!(dir_prefix(""), "");
        assert_eq!(dir_prefix("/"), "");
        assert_eq!(dir_prefix("a/b"), "a/b/");
    }

    #[test]
    fn test_first_unmatched_segment() {
        assert_eq!(first_unmatched_segment("a/b", "a/"), Some(("b", false)));
        assert_eq!(first_unmatched_segment("a/b/c", "a/"), Some(("b", true)));
        assert_eq!(first_unmatched_segment("a/b", ""), Some(("a", true)));
        assert_eq!(first_unmatched_segment("a", ""), Some(("a", false)));
        // Marker key of the directory itself
        assert_eq!(first_unmatched_segment("a/", "a/"), None);
        // Not below the prefix at all
        assert_eq!(first_unmatched_segment("b/c", "a/"), None);
        // Trailing delimiter does not imply a child
        assert_eq!(first_unmatched_segment("a/b/", "a/"), Some(("b", false)));
    }

    #[test]
    fn test_valid_segment() {
        assert!(is_valid_segment("pods"));
        assert!(!is_valid_segment(""));
        assert!(!is_valid_segment("."));
        assert!(!is_valid_segment(".."));
        assert!(!is_valid_segment("a/b"));
    }
}
