//! kvfs: browse an etcd key namespace as a read-only filesystem.
//!
//! Usage:
//!   # Snapshot produced by `etcdctl get --prefix / | paste - -d': '`
//!   kvfs --data cluster.etcd ls /registry
//!   kvfs --data cluster.etcd cat /registry/ranges/serviceips
//!
//!   # Folder/filename CSV
//!   kvfs --data folders.csv --csv tree
//!
//!   # Live cluster through etcdctl
//!   kvfs --remote stat /registry/pods
//!
//!   # Anything expressible in kvfs.toml
//!   kvfs --config kvfs.toml dump /registry/configmaps
//!
//! Logs go to stderr; set `RUST_LOG=kvfs_kernel=debug` to trace resolution.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use kvfs_kernel::constants::DEFAULT_SEPARATOR;
use kvfs_kernel::key;
use kvfs_kernel::{
    BackendConfig, FileType, KvBackend, KvfsConfig, LoadReport, PrefixQuery, ProjectionEngine,
    ProjectionError, SnapshotFormat,
};

/// Read-only filesystem view over an etcd key namespace.
#[derive(Parser, Debug)]
#[command(name = "kvfs")]
#[command(about = "Browse an etcd key namespace as a read-only filesystem")]
struct Args {
    /// TOML config selecting the backend
    #[arg(short, long, conflicts_with_all = ["data", "remote"])]
    config: Option<PathBuf>,

    /// Snapshot file to load
    #[arg(short, long, conflicts_with = "remote")]
    data: Option<PathBuf>,

    /// Key/value separator for --data
    #[arg(long, default_value = DEFAULT_SEPARATOR)]
    separator: String,

    /// Treat --data as folder,filename CSV
    #[arg(long, requires = "data")]
    csv: bool,

    /// Query a live cluster with etcdctl
    #[arg(short, long)]
    remote: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Print a file's contents
    Cat { path: String },
    /// Show synthesized attributes
    Stat { path: String },
    /// Walk a directory recursively
    Tree {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Print every key under a prefix with its value
    Dump {
        #[arg(default_value = "/")]
        prefix: String,
    },
}

impl Args {
    fn backend_config(&self) -> Result<BackendConfig> {
        if let Some(path) = &self.config {
            let config = KvfsConfig::load(path)?;
            return Ok(config.backend);
        }
        if let Some(path) = &self.data {
            return Ok(if self.csv {
                BackendConfig::folder_csv(path)
            } else {
                BackendConfig::Snapshot {
                    path: path.clone(),
                    format: SnapshotFormat::KeyValue,
                    separator: self.separator.clone(),
                }
            });
        }
        if self.remote {
            return Ok(BackendConfig::remote());
        }
        anyhow::bail!("no backend selected; pass --config, --data or --remote")
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("kvfs: {e:#}");
            match e.downcast_ref::<ProjectionError>() {
                Some(err) => ExitCode::from(err.errno() as u8),
                None => ExitCode::FAILURE,
            }
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let (backend, report) = args
        .backend_config()?
        .build()
        .context("failed to build backend")?;
    if let Some(report) = &report {
        log_report(report);
    }
    tracing::info!(backend = backend.name(), "Backend ready");

    let fs = ProjectionEngine::from_arc(Arc::clone(&backend));
    let mut out = std::io::stdout().lock();

    match &args.command {
        Command::Ls { path } => {
            for entry in fs.read_directory(path).await? {
                let suffix = if entry.kind.is_dir() { "/" } else { "" };
                writeln!(out, "{}{}", entry.name, suffix)?;
            }
        }
        Command::Cat { path } => {
            let value = fs.read_file(path).await?;
            out.write_all(&value)?;
        }
        Command::Stat { path } => {
            let (node, attr) = fs.stat(path).await?;
            let kind = match attr.kind {
                FileType::Directory => "directory",
                FileType::File => "file",
            };
            writeln!(out, "  Path: /{}", node.path())?;
            writeln!(out, "  Type: {kind}")?;
            writeln!(out, "  Size: {}", attr.size)?;
            writeln!(out, " Inode: {}", attr.ino)?;
            writeln!(out, "Access: {:04o}", attr.perm)?;
            writeln!(out, " Links: {}", attr.nlink)?;
        }
        Command::Tree { path } => tree(&fs, path, &mut out).await?,
        Command::Dump { prefix } => dump(backend.as_ref(), prefix, &mut out).await?,
    }

    out.flush()?;
    Ok(())
}

fn log_report(report: &LoadReport) {
    for record in &report.skipped {
        tracing::warn!(%record, "Skipped snapshot line");
    }
    tracing::info!(
        records = report.records,
        skipped = report.skipped.len(),
        "Snapshot loaded"
    );
}

/// Depth-first walk printing one indented line per entry.
async fn tree(fs: &ProjectionEngine, root: &str, out: &mut impl Write) -> Result<()> {
    let root = key::normalize(root);
    let (node, _) = fs.stat(&root).await?;
    writeln!(out, "/{root}")?;
    if node.is_file() {
        return Ok(());
    }

    let mut stack = vec![(root, FileType::Directory, 0usize)];
    while let Some((path, kind, depth)) = stack.pop() {
        if depth > 0 {
            let suffix = if kind.is_dir() { "/" } else { "" };
            let name = key::last_segment(&path);
            writeln!(out, "{}{name}{suffix}", "  ".repeat(depth - 1))?;
        }
        if kind.is_file() {
            continue;
        }
        // Reversed so entries pop in listing order.
        for entry in fs.read_directory(&path).await?.into_iter().rev() {
            stack.push((key::join(&path, &entry.name), entry.kind, depth + 1));
        }
    }
    Ok(())
}

/// Every key under `prefix` with its value, one `/key: value` line each.
async fn dump(backend: &dyn KvBackend, prefix: &str, out: &mut impl Write) -> Result<()> {
    let prefix = key::dir_prefix(&key::normalize(prefix));
    let mut entries = backend
        .fetch_by_prefix(&prefix, PrefixQuery::with_values())
        .await
        .map_err(ProjectionError::from)?;
    entries.sort_by(|a, b| a.key.cmp(&b.key));

    for entry in entries {
        let value = entry.value.unwrap_or_default();
        writeln!(
            out,
            "/{}{}{}",
            entry.key,
            DEFAULT_SEPARATOR,
            String::from_utf8_lossy(&value).trim_end_matches(['\r', '\n'])
        )?;
    }
    Ok(())
}
