//! Directory synthesis from a flat key listing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::attr::FileType;
use crate::key;

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Entry type.
    pub kind: FileType,
}

impl DirEntry {
    /// Create a new directory entry.
    pub fn new(name: impl Into<String>, kind: FileType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Create a file entry.
    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, FileType::File)
    }

    /// Create a directory entry.
    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, FileType::Directory)
    }
}

/// Immediate children of `dir` implied by `keys`.
///
/// Keys that do not start with the directory prefix, and the directory's
/// own marker key, contribute nothing. When one name is seen both as a file
/// and as a directory, the directory wins. Entries come back sorted by name;
/// callers should not rely on that.
pub fn list_children<'k>(dir: &str, keys: impl IntoIterator<Item = &'k str>) -> Vec<DirEntry> {
    let prefix = key::dir_prefix(dir);
    let mut children: BTreeMap<&str, FileType> = BTreeMap::new();

    for k in keys {
        let Some((name, has_more)) = key::first_unmatched_segment(k, &prefix) else {
            continue;
        };
        let kind = if has_more {
            FileType::Directory
        } else {
            FileType::File
        };
        children
            .entry(name)
            .and_modify(|existing| {
                if kind.is_dir() {
                    *existing = FileType::Directory;
                }
            })
            .or_insert(kind);
    }

    children
        .into_iter()
        .map(|(name, kind)| DirEntry::new(name, kind))
        .collect()
}
