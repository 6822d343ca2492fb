//! TOML configuration.
//!
//! ```toml
//! [backend]
//! kind = "remote"
//! program = "kubectl"
//! args = ["exec", "-n", "kube-system", "etcd-cp1", "--", "etcdctl"]
//! timeout_ms = 5000
//! max_in_flight = 8
//! ```
//!
//! ```toml
//! [backend]
//! kind = "snapshot"
//! path = "~/dumps/cluster.etcd"
//! format = "key_value"
//! separator = ": "
//! ```
//!
//! File paths go through tilde expansion.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::backend::{KvBackend, RemoteExecBackend, RemoteExecConfig, SnapshotBackend};
use crate::constants::{
    DEFAULT_CONNECTION_ARGS, DEFAULT_ETCDCTL, DEFAULT_KEY_PREFIX, DEFAULT_MAX_IN_FLIGHT,
    DEFAULT_REMOTE_TIMEOUT, DEFAULT_SEPARATOR,
};
use crate::error::LoadError;
use crate::loader::{LineFormat, LoadReport};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvfsConfig {
    /// Which backend feeds the projection.
    pub backend: BackendConfig,
}

/// Backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Key/value snapshot loaded once from a file.
    Snapshot {
        /// Source file.
        path: PathBuf,
        /// Line format.
        #[serde(default)]
        format: SnapshotFormat,
        /// Key/value separator, `key_value` format only.
        #[serde(default = "default_separator")]
        separator: String,
    },
    /// `etcdctl` invoked per request.
    Remote {
        #[serde(default = "default_program")]
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default = "default_connection_args")]
        connection_args: Vec<String>,
        #[serde(default = "default_key_prefix")]
        key_prefix: String,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
        #[serde(default = "default_max_in_flight")]
        max_in_flight: usize,
    },
}

/// Snapshot file layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotFormat {
    /// `key<separator>value` per line.
    #[default]
    KeyValue,
    /// `folder,filename` per line.
    FolderCsv,
}

fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}

fn default_program() -> String {
    DEFAULT_ETCDCTL.to_string()
}

fn default_connection_args() -> Vec<String> {
    DEFAULT_CONNECTION_ARGS.iter().map(|s| s.to_string()).collect()
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_REMOTE_TIMEOUT.as_millis() as u64
}

fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}

impl KvfsConfig {
    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Parse config text. `origin` is only used in error messages.
    pub fn parse(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        if let BackendConfig::Snapshot { path, .. } = &mut config.backend {
            *path = expand_path(path);
        }
        Ok(config)
    }
}

impl BackendConfig {
    /// Snapshot backend over `path` in the default `key: value` format.
    pub fn snapshot(path: impl Into<PathBuf>) -> Self {
        Self::Snapshot {
            path: expand_path(&path.into()),
            format: SnapshotFormat::KeyValue,
            separator: default_separator(),
        }
    }

    /// Snapshot backend over a `folder,filename` CSV file.
    pub fn folder_csv(path: impl Into<PathBuf>) -> Self {
        Self::Snapshot {
            path: expand_path(&path.into()),
            format: SnapshotFormat::FolderCsv,
            separator: default_separator(),
        }
    }

    /// Remote backend with defaults for everything.
    pub fn remote() -> Self {
        Self::Remote {
            program: default_program(),
            args: Vec::new(),
            connection_args: default_connection_args(),
            key_prefix: default_key_prefix(),
            timeout_ms: default_timeout_ms(),
            max_in_flight: default_max_in_flight(),
        }
    }

    /// Construct the configured backend.
    ///
    /// Snapshot sources are loaded here; a [`LoadError`] is fatal. The load
    /// report is returned so callers can surface skipped lines.
    pub fn build(&self) -> Result<(Arc<dyn KvBackend>, Option<LoadReport>), LoadError> {
        match self {
            BackendConfig::Snapshot {
                path,
                format,
                separator,
            } => {
                let format = match format {
                    SnapshotFormat::KeyValue => LineFormat::KeyValue {
                        separator: separator.clone(),
                    },
                    SnapshotFormat::FolderCsv => LineFormat::FolderCsv,
                };
                let (backend, report) = SnapshotBackend::load(path, &format)?;
                let backend: Arc<dyn KvBackend> = Arc::new(backend);
                Ok((backend, Some(report)))
            }
            BackendConfig::Remote {
                program,
                args,
                connection_args,
                key_prefix,
                timeout_ms,
                max_in_flight,
            } => {
                let backend: Arc<dyn KvBackend> = Arc::new(RemoteExecBackend::new(RemoteExecConfig {
                    program: program.clone(),
                    args: args.clone(),
                    connection_args: connection_args.clone(),
                    key_prefix: key_prefix.clone(),
                    timeout: Duration::from_millis(*timeout_ms),
                    max_in_flight: *max_in_flight,
                }));
                Ok((backend, None))
            }
        }
    }
}

fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).as_ref())
}
