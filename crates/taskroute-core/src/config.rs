//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::task::{SlaTier, TaskKind};

/// Paths to all TaskRoute data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// SQLite directory (`data/db/`).
    pub db: PathBuf,
    /// Uploaded artifact bytes (`data/uploads/`).
    pub uploads: PathBuf,
    /// Optional backend catalog override (`data/backends.json`).
    pub catalog_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            db: root.join("db"),
            uploads: root.join("uploads"),
            catalog_file: root.join("backends.json"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.db)?;
        std::fs::create_dir_all(&self.uploads)?;
        Ok(())
    }
}

/// Task settings applied when an ingestion is resumed without an explicit
/// trigger payload (in-process queue delivery).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeDefaults {
    pub kind: TaskKind,
    pub sla: SlaTier,
    pub budget: i64,
}

impl Default for ResumeDefaults {
    fn default() -> Self {
        Self {
            kind: TaskKind::Summary,
            sla: SlaTier::LowCost,
            budget: 10,
        }
    }
}

/// Top-level TaskRoute configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRouteConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Execution attempts per pipeline run before a task is marked failed.
    pub max_attempts: u32,
    /// Upper bound of the simulated latency jitter, in milliseconds.
    pub jitter_ms: u64,
    /// Workflow webhook receiving ingestion events. `None` keeps delivery
    /// in-process.
    pub webhook_url: Option<String>,
    pub resume_defaults: ResumeDefaults,
}

impl TaskRouteConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::from_lookup(data_dir, |key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(data_dir: impl AsRef<Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = parse_or(&lookup, "PORT", 3010u16)?;
        let max_attempts = parse_or(&lookup, "TASKROUTE_MAX_ATTEMPTS", 2u32)?.max(1);
        let jitter_ms = parse_or(&lookup, "TASKROUTE_JITTER_MS", 50u64)?;
        let webhook_url = lookup("TASKROUTE_WEBHOOK_URL").filter(|u| !u.trim().is_empty());

        let mut resume_defaults = ResumeDefaults::default();
        if let Some(kind) = lookup("TASKROUTE_DEFAULT_KIND") {
            resume_defaults.kind = kind.parse().map_err(|e| Error::Config(format!("{}", e)))?;
        }
        if let Some(sla) = lookup("TASKROUTE_DEFAULT_SLA") {
            resume_defaults.sla = sla.parse().map_err(|e| Error::Config(format!("{}", e)))?;
        }
        resume_defaults.budget = parse_or(&lookup, "TASKROUTE_DEFAULT_BUDGET", resume_defaults.budget)?;
        if resume_defaults.budget < 0 {
            return Err(Error::Config("TASKROUTE_DEFAULT_BUDGET must be non-negative".into()));
        }

        let data_paths = DataPaths::new(data_dir)?;
        debug!(
            "Config: port={}, max_attempts={}, jitter_ms={}, webhook={}",
            port,
            max_attempts,
            jitter_ms,
            webhook_url.as_deref().unwrap_or("none")
        );

        Ok(Self {
            port,
            data_paths,
            max_attempts,
            jitter_ms,
            webhook_url,
            resume_defaults,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value: {}", key, raw))),
        None => Ok(default),
    }
}
