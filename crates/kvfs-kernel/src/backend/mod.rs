//! Key-value backends.
//!
//! Backends implement [`KvBackend`] and speak canonical keys (see
//! [`crate::key`]). The projection is written once against this trait.

mod remote;
mod snapshot;

pub use remote::{CommandOutput, CommandRunner, ProcessRunner, RemoteExecBackend, RemoteExecConfig};
pub use snapshot::SnapshotBackend;

use async_trait::async_trait;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Backend-internal error type.
///
/// Never crosses the engine boundary; see [`crate::ProjectionError`].
#[derive(Debug, Error)]
pub enum BackendError {
    /// Key or prefix does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote call exceeded its deadline and was cancelled.
    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    /// The external command could not be started.
    #[error("failed to spawn command: {0}")]
    Spawn(#[source] io::Error),

    /// The external command exited unsuccessfully.
    #[error("command failed ({status}): {stderr}")]
    CommandFailed {
        /// Exit status as reported by the OS.
        status: String,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// Output could not be parsed.
    #[error("invalid backend output: {0}")]
    InvalidOutput(String),

    /// Backend is not able to serve requests.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Backend result type.
pub type BackendResult<T> = Result<T, BackendError>;

/// One key returned by a prefix probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    /// Canonical key.
    pub key: String,
    /// Value, omitted for keys-only queries.
    pub value: Option<Vec<u8>>,
}

impl KeyEntry {
    /// Entry without a value.
    pub fn key_only(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    /// Entry carrying its value.
    pub fn with_value(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }
}

/// Shape of a prefix probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrefixQuery {
    /// Stop after this many keys.
    pub limit: Option<usize>,
    /// Skip values.
    pub keys_only: bool,
}

impl PrefixQuery {
    /// Enumerate every key under the prefix, without values.
    pub fn keys() -> Self {
        Self {
            limit: None,
            keys_only: true,
        }
    }

    /// Existence check: at most one key, no values.
    pub fn exists() -> Self {
        Self {
            limit: Some(1),
            keys_only: true,
        }
    }

    /// Every key with its value.
    pub fn with_values() -> Self {
        Self {
            limit: None,
            keys_only: false,
        }
    }
}

/// What a backend declares about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCapabilities {
    /// Calls may block on network or subprocess I/O.
    pub may_block: bool,
    /// Values end with a line terminator that is not part of the content.
    pub line_terminated_values: bool,
}

/// Capability set every data source provides.
///
/// Keys passed in and returned are canonical: no leading or trailing
/// delimiter. The root prefix is `""`.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Capability declaration.
    fn capabilities(&self) -> BackendCapabilities;

    /// Fetch the value stored at exactly `key`.
    ///
    /// Returns `Ok(None)` when the key does not exist.
    async fn fetch_exact(&self, key: &str) -> BackendResult<Option<Vec<u8>>>;

    /// Fetch keys starting with `prefix` (a plain string prefix).
    ///
    /// Ordering of the result is backend specific.
    async fn fetch_by_prefix(
        &self,
        prefix: &str,
        query: PrefixQuery,
    ) -> BackendResult<Vec<KeyEntry>>;
}
