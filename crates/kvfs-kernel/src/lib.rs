//! # kvfs-kernel
//!
//! Projects a flat, delimiter-structured key-value namespace (etcd style,
//! `/registry/pods/default/nginx`) onto filesystem semantics.
//!
//! There are no directory records in the store. Structure is inferred from
//! the keys alone:
//!
//! ```text
//! keys                          projection
//! ─────────────────────────     ─────────────────
//! /registry/pods/default/a  ─►  registry/
//! /registry/pods/default/b        pods/
//! /registry/ranges/ip             default/
//!                                   a   (file)
//!                                   b   (file)
//!                                 ranges/
//!                                   ip  (file)
//! ```
//!
//! Key components:
//!
//! - [`KvBackend`] - capability trait every data source implements
//! - [`SnapshotBackend`] - in-memory mapping loaded once from a file
//! - [`RemoteExecBackend`] - runs `etcdctl` per request and parses its output
//! - [`ProjectionEngine`] - lookup, readdir, read and getattr over any backend
//!
//! ## Design Decisions
//!
//! - **Path-based, no inode table**: inode numbers are a hash of the path,
//!   so repeated lookups of the same path yield the same identity.
//! - **Directories win**: a key that is both a value and a prefix of other
//!   keys resolves as a directory. Its own value is unreachable.
//! - **Read-only**: there is no write path.

pub mod attr;
pub mod backend;
pub mod config;
pub mod constants;
mod error;
pub mod key;
pub mod listing;
pub mod loader;
pub mod projection;
pub mod resolver;

pub use attr::{FileAttr, FileType, stable_id};
pub use backend::{
    BackendCapabilities, BackendError, BackendResult, CommandOutput, CommandRunner, KeyEntry,
    KvBackend, PrefixQuery, ProcessRunner, RemoteExecBackend, RemoteExecConfig, SnapshotBackend,
};
pub use config::{BackendConfig, ConfigError, KvfsConfig, SnapshotFormat};
pub use error::{LoadError, ProjectionError, ProjectionResult};
pub use listing::DirEntry;
pub use loader::{LineFormat, LoadReport, MalformedRecord};
pub use projection::ProjectionEngine;
pub use resolver::Node;
