//! In-memory snapshot backend.
//!
//! Serves a key/value mapping loaded once from a file. The mapping itself is
//! immutable; a reload builds a new one and swaps it in whole.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::{BackendCapabilities, BackendResult, KeyEntry, KvBackend, PrefixQuery};
use crate::error::LoadError;
use crate::loader::{self, LineFormat, LoadReport, Snapshot};

/// In-memory, read-only backend.
///
/// Readers take the shared lock only long enough to clone the `Arc`, so a
/// concurrent [`SnapshotBackend::reload_from`] never exposes a partially
/// built mapping.
#[derive(Debug, Default)]
pub struct SnapshotBackend {
    data: RwLock<Arc<Snapshot>>,
}

impl SnapshotBackend {
    /// Create a backend over an already-canonical mapping.
    pub fn new(data: Snapshot) -> Self {
        Self {
            data: RwLock::new(Arc::new(data)),
        }
    }

    /// Build from raw `(key, value)` pairs, canonicalizing keys.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<Vec<u8>>,
    {
        let data = pairs
            .into_iter()
            .map(|(k, v)| (crate::key::normalize(k.as_ref()), v.into()))
            .filter(|(k, _)| !k.is_empty())
            .collect();
        Self::new(data)
    }

    /// Load from a snapshot file.
    pub fn load(path: &Path, format: &LineFormat) -> Result<(Self, LoadReport), LoadError> {
        let (data, report) = loader::load_file(path, format)?;
        Ok((Self::new(data), report))
    }

    /// Replace the mapping with a fresh load of `path`.
    ///
    /// On error the current mapping stays in place.
    pub fn reload_from(&self, path: &Path, format: &LineFormat) -> Result<LoadReport, LoadError> {
        let (data, report) = loader::load_file(path, format)?;
        self.replace(data);
        info!(path = %path.display(), records = report.records, "Snapshot reloaded");
        Ok(report)
    }

    /// Atomically swap in a new mapping.
    pub fn replace(&self, data: Snapshot) {
        *self.data.write() = Arc::new(data);
    }

    /// Number of keys currently served.
    pub fn len(&self) -> usize {
        self.current().len()
    }

    /// Returns true if no keys are loaded.
    pub fn is_empty(&self) -> bool {
        self.current().is_empty()
    }

    fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.data.read())
    }
}

#[async_trait]
impl KvBackend for SnapshotBackend {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            may_block: false,
            line_terminated_values: false,
        }
    }

    async fn fetch_exact(&self, key: &str) -> BackendResult<Option<Vec<u8>>> {
        Ok(self.current().get(key).cloned())
    }

    async fn fetch_by_prefix(
        &self,
        prefix: &str,
        query: PrefixQuery,
    ) -> BackendResult<Vec<KeyEntry>> {
        let data = self.current();
        let limit = query.limit.unwrap_or(usize::MAX);

        // Keys sharing a prefix are contiguous in a BTreeMap.
        let entries = data
            .range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .take(limit)
            .map(|(k, v)| KeyEntry {
                key: k.clone(),
                value: (!query.keys_only).then(|| v.clone()),
            })
            .collect();
        Ok(entries)
    }
}
