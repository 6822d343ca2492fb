//! Projection engine: the operations a filesystem-serving layer calls.
//!
//! The serving layer (a FUSE adapter, an RPC service, the `kvfs` CLI)
//! dispatches each event as an independent task. Every method here takes
//! `&self`, performs a bounded number of backend calls, and returns either a
//! result or a [`ProjectionError`]. Nothing is cached between calls, so a
//! listing may observe a different store state than the lookup before it.

use std::sync::Arc;
use tracing::debug;

use crate::attr::FileAttr;
use crate::backend::{BackendError, KvBackend, PrefixQuery};
use crate::error::{ProjectionError, ProjectionResult};
use crate::key;
use crate::listing::{self, DirEntry};
use crate::resolver::{self, Node};

/// Read-only filesystem view over a [`KvBackend`].
#[derive(Clone)]
pub struct ProjectionEngine {
    backend: Arc<dyn KvBackend>,
}

impl std::fmt::Debug for ProjectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectionEngine")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl ProjectionEngine {
    /// Create an engine over a backend.
    pub fn new(backend: impl KvBackend + 'static) -> Self {
        Self::from_arc(Arc::new(backend))
    }

    /// Create an engine over a shared backend.
    pub fn from_arc(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend }
    }

    /// The underlying backend.
    pub fn backend(&self) -> &Arc<dyn KvBackend> {
        &self.backend
    }

    fn strips_terminator(&self) -> bool {
        self.backend.capabilities().line_terminated_values
    }

    /// The root directory. Always resolves.
    pub fn root_node(&self) -> Node {
        Node::root()
    }

    /// Resolve `name` inside the directory at `parent`.
    pub async fn lookup(&self, parent: &str, name: &str) -> ProjectionResult<Node> {
        let parent = key::normalize(parent);
        resolver::resolve(self.backend.as_ref(), &parent, name, self.strips_terminator()).await
    }

    /// Immediate children of the directory at `path`.
    ///
    /// An empty listing is valid and distinct from a lookup failure.
    pub async fn read_directory(&self, path: &str) -> ProjectionResult<Vec<DirEntry>> {
        let path = key::normalize(path);
        let keys = match self
            .backend
            .fetch_by_prefix(&key::dir_prefix(&path), PrefixQuery::keys())
            .await
        {
            Ok(keys) => keys,
            Err(BackendError::NotFound(_)) => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let entries = listing::list_children(&path, keys.iter().map(|e| e.key.as_str()));
        debug!(
            path = %path,
            keys = keys.len(),
            entries = entries.len(),
            "Read directory"
        );
        Ok(entries)
    }

    /// Contents of the file at `path`.
    ///
    /// Reads the key directly without resolving it first. A value shadowed
    /// by a directory at the same path is unreachable through [`lookup`]
    /// and [`stat`], but a caller that skips resolution can still read it.
    ///
    /// [`lookup`]: Self::lookup
    /// [`stat`]: Self::stat
    pub async fn read_file(&self, path: &str) -> ProjectionResult<Vec<u8>> {
        let path = key::normalize(path);
        if key::is_root(&path) {
            return Err(ProjectionError::not_found(path));
        }

        match self.backend.fetch_exact(&path).await? {
            Some(mut value) => {
                if self.strips_terminator() {
                    resolver::trim_line_terminator(&mut value);
                }
                debug!(path = %path, size = value.len(), "Read file");
                Ok(value)
            }
            None => Err(ProjectionError::not_found(path)),
        }
    }

    /// Attributes of a resolved node. No backend call.
    pub fn attributes(&self, node: &Node) -> FileAttr {
        FileAttr::of(node)
    }

    /// Resolve an absolute path and synthesize its attributes.
    ///
    /// Equivalent to `lookup(parent_of(path), last_segment(path))`.
    pub async fn stat(&self, path: &str) -> ProjectionResult<(Node, FileAttr)> {
        let path = key::normalize(path);
        let node = if key::is_root(&path) {
            self.root_node()
        } else {
            self.lookup(&key::parent_of(&path), key::last_segment(&path))
                .await?
        };
        let attr = self.attributes(&node);
        Ok((node, attr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::FileType;
    use crate::backend::SnapshotBackend;

    fn engine(pairs: &[(&str, &str)]) -> ProjectionEngine {
        ProjectionEngine::new(SnapshotBackend::from_pairs(pairs.iter().copied()))
    }

    #[tokio::test]
    async fn test_basic_projection() {
        let fs = engine(&[("/a/b", "v1"), ("/a/c", "v2")]);

        let entries = fs.read_directory("/a").await.unwrap();
        assert_eq!(entries, vec![DirEntry::file("b"), DirEntry::file("c")]);

        let entries = fs.read_directory("/").await.unwrap();
        assert_eq!(entries, vec![DirEntry::directory("a")]);

        assert_eq!(fs.read_file("/a/b").await.unwrap(), b"v1");

        let err = fs.lookup("/", "missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_read_file_missing_and_root() {
        let fs = engine(&[("/a/b", "v1")]);
        assert!(fs.read_file("/a/zz").await.unwrap_err().is_not_found());
        assert!(fs.read_file("/").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_stat() {
        let fs = engine(&[("/a/b", "hello")]);

        let (node, attr) = fs.stat("/").await.unwrap();
        assert!(node.is_dir());
        assert_eq!(attr.kind, FileType::Directory);

        let (node, attr) = fs.stat("/a/b").await.unwrap();
        assert_eq!(node.path(), "a/b");
        assert_eq!(attr.size, 5);
        assert_eq!(attr.perm, 0o444);

        assert!(fs.stat("/a/nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_empty_directory_listing() {
        let fs = engine(&[("/a/b", "v")]);
        assert!(fs.read_directory("/elsewhere").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_root_node() {
        let fs = engine(&[]);
        assert_eq!(fs.root_node(), Node::root());
        assert!(fs.read_directory("").await.unwrap().is_empty());
    }
}
