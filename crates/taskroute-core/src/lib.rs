//! TaskRoute Core — error taxonomy, task domain types, configuration.

pub mod config;
pub mod error;
pub mod task;

pub use config::{DataPaths, ResumeDefaults, TaskRouteConfig};
pub use error::{Error, ErrorKind, Result};
pub use task::{ArtifactStatus, SlaTier, TaskKind, TaskOrigin, TaskStatus, TranscriptStatus};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
