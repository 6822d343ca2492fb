//! Default configuration values.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

use std::time::Duration;

/// Separator between key and value in snapshot files.
pub const DEFAULT_SEPARATOR: &str = ": ";

/// Administrative tool invoked by the remote backend.
pub const DEFAULT_ETCDCTL: &str = "etcdctl";

/// Deadline for a single remote command.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum concurrent remote commands.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Prefix the remote store puts in front of canonical keys.
pub const DEFAULT_KEY_PREFIX: &str = "/";

/// Connection arguments for etcdctl on a kubeadm control-plane node.
pub const DEFAULT_CONNECTION_ARGS: &[&str] = &[
    "--endpoints=https://127.0.0.1:2379",
    "--cacert=/etc/kubernetes/pki/etcd/ca.crt",
    "--cert=/etc/kubernetes/pki/etcd/server.crt",
    "--key=/etc/kubernetes/pki/etcd/server.key",
];

/// Permission bits for synthesized directories (read + traverse).
pub const DIR_PERM: u32 = 0o555;

/// Permission bits for synthesized files (read-only).
pub const FILE_PERM: u32 = 0o444;
