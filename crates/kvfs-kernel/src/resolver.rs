//! Node resolution: is a child a directory, a file, or absent?
//!
//! A path is a directory when at least one key lives below it, and a file
//! when a key equals it exactly. The directory probe runs first, so a key
//! that is also a prefix of other keys resolves as a directory and its own
//! value cannot be read through the projection.

use tracing::debug;

use crate::backend::{BackendError, KvBackend, PrefixQuery};
use crate::error::{ProjectionError, ProjectionResult};
use crate::key;

/// A resolved node. Created per lookup and discarded after use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Strict prefix of one or more keys, or the root.
    Directory {
        /// Canonical path.
        path: String,
    },
    /// Exact key match, with the value captured during resolution.
    File {
        /// Canonical path (equal to the key).
        path: String,
        /// Value as seen at lookup time.
        value: Vec<u8>,
    },
}

impl Node {
    /// The root directory.
    pub fn root() -> Self {
        Self::directory(key::ROOT)
    }

    /// Create a directory node.
    pub fn directory(path: impl Into<String>) -> Self {
        Self::Directory { path: path.into() }
    }

    /// Create a file node.
    pub fn file(path: impl Into<String>, value: Vec<u8>) -> Self {
        Self::File {
            path: path.into(),
            value,
        }
    }

    /// Canonical path of the node.
    pub fn path(&self) -> &str {
        match self {
            Node::Directory { path } | Node::File { path, .. } => path,
        }
    }

    /// Returns true for directories.
    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Directory { .. })
    }

    /// Returns true for files.
    pub fn is_file(&self) -> bool {
        matches!(self, Node::File { .. })
    }
}

/// Resolve `name` inside `parent`.
///
/// Costs at most one prefix probe (capped at one key) and one exact probe.
/// `strip_terminator` removes a single trailing line terminator from the
/// captured value, for backends whose output format appends one.
pub async fn resolve(
    backend: &dyn KvBackend,
    parent: &str,
    name: &str,
    strip_terminator: bool,
) -> ProjectionResult<Node> {
    let full = key::join(parent, name);
    if key::is_root(&full) {
        return Ok(Node::root());
    }
    if !key::is_valid_segment(name.trim_matches(key::DELIMITER)) {
        return Err(ProjectionError::not_found(full));
    }

    match backend
        .fetch_by_prefix(&key::dir_prefix(&full), PrefixQuery::exists())
        .await
    {
        Ok(entries) if !entries.is_empty() => {
            debug!(path = %full, "Resolved directory");
            return Ok(Node::directory(full));
        }
        Ok(_) | Err(BackendError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    match backend.fetch_exact(&full).await? {
        Some(mut value) => {
            if strip_terminator {
                trim_line_terminator(&mut value);
            }
            debug!(path = %full, size = value.len(), "Resolved file");
            Ok(Node::file(full, value))
        }
        None => {
            debug!(path = %full, "Not found");
            Err(ProjectionError::not_found(full))
        }
    }
}

/// Drop one trailing `\n` or `\r\n`.
pub(crate) fn trim_line_terminator(value: &mut Vec<u8>) {
    if value.last() == Some(&b'\n') {
        value.pop();
        if value.last() == Some(&b'\r') {
            value.pop();
        }
    }
}
