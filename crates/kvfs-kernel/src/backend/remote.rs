//! Remote backend driven by an administrative CLI (`etcdctl`).
//!
//! Every call runs one command and parses its text output. There is no
//! local copy and no caching.
//!
//! ```text
//! fetch_exact("registry/ns/default")
//!     │
//!     ▼
//! <program> <args…> get /registry/ns/default <connection_args…>
//!     │
//!     ▼  stdout
//! /registry/ns/default      ← echoed key
//! {"kind":"Namespace",…}    ← value
//! ```
//!
//! `program` and `args` select the transport: `etcdctl` directly, or for
//! example `kubectl exec -n kube-system etcd-node -- etcdctl`.

use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::{BackendCapabilities, BackendError, BackendResult, KeyEntry, KvBackend, PrefixQuery};
use crate::constants::{
    DEFAULT_CONNECTION_ARGS, DEFAULT_ETCDCTL, DEFAULT_KEY_PREFIX, DEFAULT_MAX_IN_FLIGHT,
    DEFAULT_REMOTE_TIMEOUT,
};
use crate::key;

/// How to reach the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteExecConfig {
    /// Program to execute.
    pub program: String,
    /// Fixed arguments placed before the verb.
    pub args: Vec<String>,
    /// Endpoint and credential arguments appended after the verb.
    pub connection_args: Vec<String>,
    /// Prefix the store puts in front of canonical keys.
    pub key_prefix: String,
    /// Deadline for a single command.
    pub timeout: Duration,
    /// Maximum concurrent commands.
    pub max_in_flight: usize,
}

impl Default for RemoteExecConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_ETCDCTL.to_string(),
            args: Vec::new(),
            connection_args: DEFAULT_CONNECTION_ARGS.iter().map(|s| s.to_string()).collect(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            timeout: DEFAULT_REMOTE_TIMEOUT,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

/// Captured result of one command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit status was zero.
    pub success: bool,
    /// Exit status for diagnostics.
    pub status: String,
    /// Captured standard output.
    pub stdout: Vec<u8>,
    /// Captured standard error.
    pub stderr: Vec<u8>,
}

/// Executes a command and captures its output.
///
/// Dropping the returned future must abandon the command.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` to completion.
    async fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput>;
}

/// Runs commands as local child processes.
///
/// Children are killed when the future is dropped, which is how timeouts and
/// caller cancellation reach the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(CommandOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Backend that shells out once per request.
pub struct RemoteExecBackend {
    config: RemoteExecConfig,
    runner: Arc<dyn CommandRunner>,
    permits: Semaphore,
}

impl std::fmt::Debug for RemoteExecBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteExecBackend")
            .field("config", &self.config)
            .field("available_permits", &self.permits.available_permits())
            .finish()
    }
}

impl RemoteExecBackend {
    /// Create a backend that runs real child processes.
    pub fn new(config: RemoteExecConfig) -> Self {
        Self::with_runner(config, Arc::new(ProcessRunner))
    }

    /// Create a backend with a custom command runner.
    pub fn with_runner(config: RemoteExecConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let permits = Semaphore::new(config.max_in_flight.max(1));
        Self {
            config,
            runner,
            permits,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &RemoteExecConfig {
        &self.config
    }

    fn remote_key(&self, canonical: &str) -> String {
        format!("{}{}", self.config.key_prefix, canonical)
    }

    fn canonical_key(&self, remote: &str) -> Option<String> {
        let stripped = remote.strip_prefix(self.config.key_prefix.as_str())?;
        let canonical = key::normalize(stripped);
        (!canonical.is_empty()).then_some(canonical)
    }

    /// Run one verb under the concurrency bound and the deadline.
    async fn execute(&self, verb: Vec<String>, subject: &str) -> BackendResult<CommandOutput> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| BackendError::Unavailable("remote backend shut down".into()))?;

        let mut args = self.config.args.clone();
        args.extend(verb);
        args.extend(self.config.connection_args.iter().cloned());
        debug!(program = %self.config.program, args = %args.join(" "), "Executing remote command");

        let output = tokio::time::timeout(
            self.config.timeout,
            self.runner.run(&self.config.program, &args),
        )
        .await
        .map_err(|_| {
            warn!(key = %subject, timeout = ?self.config.timeout, "Remote command timed out");
            BackendError::Timeout(self.config.timeout)
        })?
        .map_err(BackendError::Spawn)?;

        if output.success {
            return Ok(output);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.to_lowercase().contains("not found") {
            return Err(BackendError::NotFound(subject.to_string()));
        }
        warn!(key = %subject, status = %output.status, stderr = %stderr, "Remote command failed");
        Err(BackendError::CommandFailed {
            status: output.status,
            stderr,
        })
    }
}

/// Split exact-get output into the echoed key and the value.
///
/// Returns `None` for empty output (key absent).
fn parse_exact(stdout: &[u8]) -> Option<Vec<u8>> {
    if stdout.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match stdout.iter().position(|&b| b == b'\n') {
        Some(idx) => Some(stdout[idx + 1..].to_vec()),
        None => Some(Vec::new()),
    }
}

/// Keys-only prefix output: one key per non-blank line.
fn parse_keys(stdout: &str) -> Vec<&str> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Prefix output with values: alternating key and value lines.
///
/// Values spanning several lines cannot be told apart from keys in this
/// format and are rejected as invalid output when they unbalance the pairs.
fn parse_pairs(stdout: &str) -> BackendResult<Vec<(&str, &str)>> {
    let lines: Vec<&str> = stdout.lines().collect();
    if lines.len() % 2 != 0 {
        return Err(BackendError::InvalidOutput(format!(
            "expected key/value line pairs, got {} lines",
            lines.len()
        )));
    }
    Ok(lines.chunks(2).map(|pair| (pair[0].trim(), pair[1])).collect())
}

#[async_trait]
impl KvBackend for RemoteExecBackend {
    fn name(&self) -> &'static str {
        "remote-exec"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            may_block: true,
            line_terminated_values: true,
        }
    }

    async fn fetch_exact(&self, key: &str) -> BackendResult<Option<Vec<u8>>> {
        let remote = self.remote_key(key);
        let output = match self.execute(vec!["get".into(), remote], key).await {
            Ok(output) => output,
            Err(BackendError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(parse_exact(&output.stdout))
    }

    async fn fetch_by_prefix(
        &self,
        prefix: &str,
        query: PrefixQuery,
    ) -> BackendResult<Vec<KeyEntry>> {
        let mut verb = vec!["get".to_string(), self.remote_key(prefix), "--prefix".into()];
        if query.keys_only {
            verb.push("--keys-only".into());
        }
        if let Some(limit) = query.limit {
            verb.push(format!("--limit={limit}"));
        }

        let output = self.execute(verb, prefix).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        let mut entries: Vec<KeyEntry> = if query.keys_only {
            parse_keys(&stdout)
                .into_iter()
                .filter_map(|raw| self.canonical_key(raw))
                .map(KeyEntry::key_only)
                .collect()
        } else {
            parse_pairs(&stdout)?
                .into_iter()
                .filter_map(|(raw, value)| {
                    self.canonical_key(raw)
                        .map(|k| KeyEntry::with_value(k, value.as_bytes()))
                })
                .collect()
        };

        if let Some(limit) = query.limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }
}
