//! Synthesized file attributes.
//!
//! Nothing here is persisted. The store keeps no timestamps or modes, so
//! every attribute record is derived on demand: permissions are fixed,
//! timestamps are the time of the query, and the inode number is a hash
//! of the path.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::constants::{DIR_PERM, FILE_PERM};
use crate::resolver::Node;

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file backed by a key's value.
    File,
    /// Directory implied by keys sharing a prefix.
    Directory,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// File attributes (metadata).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAttr {
    /// Stable identifier derived from the path.
    pub ino: u64,
    /// Size in bytes. Zero for directories.
    pub size: u64,
    /// File type.
    pub kind: FileType,
    /// Unix permissions (e.g., 0o444).
    pub perm: u32,
    /// Number of hard links.
    pub nlink: u32,
    /// Last modification time. Always the query time.
    pub mtime: SystemTime,
    /// Last access time.
    pub atime: SystemTime,
    /// Change time.
    pub ctime: SystemTime,
}

impl FileAttr {
    /// Attributes for a read-only file.
    pub fn file(path: &str, size: u64) -> Self {
        let now = SystemTime::now();
        Self {
            ino: stable_id(path),
            size,
            kind: FileType::File,
            perm: FILE_PERM,
            nlink: 1,
            mtime: now,
            atime: now,
            ctime: now,
        }
    }

    /// Attributes for a read + traverse directory.
    pub fn directory(path: &str) -> Self {
        let now = SystemTime::now();
        Self {
            ino: stable_id(path),
            size: 0,
            kind: FileType::Directory,
            perm: DIR_PERM,
            nlink: 2, // . and ..
            mtime: now,
            atime: now,
            ctime: now,
        }
    }

    /// Derive attributes for a resolved node. Performs no backend I/O.
    pub fn of(node: &Node) -> Self {
        match node {
            Node::Directory { path } => Self::directory(path),
            Node::File { path, value } => Self::file(path, value.len() as u64),
        }
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// DJB2 hash of a canonical path.
///
/// Deterministic across calls and processes, so the serving layer sees the
/// same identity for repeated lookups of one path.
pub fn stable_id(path: &str) -> u64 {
    path.bytes().fold(5381u64, |h, b| {
        (h << 5).wrapping_add(h).wrapping_add(u64::from(b))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type() {
        assert!(FileType::File.is_file());
        assert!(!FileType::File.is_dir());
        assert!(FileType::Directory.is_dir());
    }

    #[test]
    fn test_stable_id() {
        assert_eq!(stable_id(""), 5381);
        // 5381 * 33 + 'a'
        assert_eq!(stable_id("a"), 177_670);
        assert_eq!(stable_id("registry/pods"), stable_id("registry/pods"));
        assert_ne!(stable_id("a/b"), stable_id("a/c"));
    }

    #[test]
    fn test_attrs_of_nodes() {
        let dir = FileAttr::of(&Node::directory("a"));
        assert!(dir.is_dir());
        assert_eq!(dir.perm, 0o555);
        assert_eq!(dir.nlink, 2);
        assert_eq!(dir.ino, stable_id("a"));

        let file = FileAttr::of(&Node::file("a/b", b"hello".to_vec()));
        assert!(file.is_file());
        assert_eq!(file.perm, 0o444);
        assert_eq!(file.size, 5);
        assert_eq!(file.ino, stable_id("a/b"));
    }

    #[test]
    fn test_timestamps_are_query_time() {
        let before = SystemTime::now();
        let attr = FileAttr::directory("");
        assert!(attr.mtime >= before);
        assert_eq!(attr.mtime, attr.ctime);
    }
}
