//! Task domain enums shared by every crate.
//!
//! Each enum round-trips through the lowercase string stored in SQLite and
//! sent over HTTP, so `as_str` and `FromStr` must stay in sync with the
//! serde renames.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// What the caller wants done with the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Summary,
    Classification,
    Extraction,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [Self::Summary, Self::Classification, Self::Extraction];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Classification => "classification",
            Self::Extraction => "extraction",
        }
    }
}

impl FromStr for TaskKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "summary" => Ok(Self::Summary),
            "classification" => Ok(Self::Classification),
            "extraction" => Ok(Self::Extraction),
            other => Err(Error::InvalidInput(format!(
                "unknown task kind '{}', expected summary, classification or extraction",
                other
            ))),
        }
    }
}

/// Caller-declared priority used to pick the preferred backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaTier {
    LowLatency,
    LowCost,
    HighQuality,
}

impl SlaTier {
    pub const ALL: [SlaTier; 3] = [Self::HighQuality, Self::LowLatency, Self::LowCost];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LowLatency => "low_latency",
            Self::LowCost => "low_cost",
            Self::HighQuality => "high_quality",
        }
    }
}

impl FromStr for SlaTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low_latency" => Ok(Self::LowLatency),
            "low_cost" => Ok(Self::LowCost),
            "high_quality" => Ok(Self::HighQuality),
            other => Err(Error::InvalidInput(format!(
                "unknown SLA tier '{}', expected low_latency, low_cost or high_quality",
                other
            ))),
        }
    }
}

/// Task lifecycle: `pending → routed → running → completed`, or `failed`
/// from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Routed,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        Self::Pending,
        Self::Routed,
        Self::Running,
        Self::Completed,
        Self::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Routed => "routed",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Forward-only transitions. `Running → Running` is allowed so a retry
    /// can start from a task whose previous attempt failed.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        match (self, next) {
            (Pending, Routed) => true,
            (Routed, Running) => true,
            (Running, Running) => true,
            (Running, Completed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Statuses from which `next` may be entered.
    pub fn predecessors(next: TaskStatus) -> Vec<TaskStatus> {
        Self::ALL
            .into_iter()
            .filter(|s| s.can_transition_to(next))
            .collect()
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "routed" => Ok(Self::Routed),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::InvalidInput(format!("unknown task status '{}'", other))),
        }
    }
}

/// Which entry point created a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOrigin {
    /// Direct create-task request.
    Api,
    /// Resumed from ingested content by the workflow trigger.
    Resume,
}

impl TaskOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Resume => "resume",
        }
    }
}

impl FromStr for TaskOrigin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "api" => Ok(Self::Api),
            "resume" => Ok(Self::Resume),
            other => Err(Error::InvalidInput(format!("unknown task origin '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    Uploaded,
    Processing,
    Ready,
    Failed,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for ArtifactStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(Self::Uploaded),
            "processing" => Ok(Self::Processing),
            "ready" => Ok(Self::Ready),
            "failed" => Ok(Self::Failed),
            other => Err(Error::InvalidInput(format!("unknown artifact status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptStatus {
    Processing,
    Ready,
    Failed,
}

impl TranscriptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for TranscriptStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "ready" => Ok(Self::Ready),
            "failed" => Ok(Self::Failed),
            other => Err(Error::InvalidInput(format!("unknown transcript status '{}'", other))),
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(TaskKind, SlaTier, TaskStatus, TaskOrigin, ArtifactStatus, TranscriptStatus);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_moves_forward_only() {
        use TaskStatus::*;
        assert!(Pending.can_transition_to(Routed));
        assert!(Routed.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(!Routed.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Pending.can_transition_to(Completed));
    }

    #[test]
    fn test_failed_reachable_from_non_terminal_only() {
        use TaskStatus::*;
        for s in [Pending, Routed, Running] {
            assert!(s.can_transition_to(Failed), "{} -> failed", s);
        }
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Failed));
    }

    #[test]
    fn test_predecessors_of_running() {
        let preds = TaskStatus::predecessors(TaskStatus::Running);
        assert_eq!(preds, vec![TaskStatus::Routed, TaskStatus::Running]);
    }

    #[test]
    fn test_unknown_sla_is_invalid_input() {
        let err = "fastest".parse::<SlaTier>().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);
        assert_eq!("high_quality".parse::<SlaTier>().unwrap(), SlaTier::HighQuality);
    }

    #[test]
    fn test_sla_parse_is_case_insensitive() {
        assert_eq!("High_Quality".parse::<SlaTier>().unwrap(), SlaTier::HighQuality);
        assert_eq!(" LOW_COST ".parse::<SlaTier>().unwrap(), SlaTier::LowCost);
    }

    #[test]
    fn test_task_kind_parse_is_case_insensitive() {
        assert_eq!("Summary".parse::<TaskKind>().unwrap(), TaskKind::Summary);
        assert!("translation".parse::<TaskKind>().is_err());
    }

    #[test]
    fn test_serde_matches_as_str() {
        for tier in SlaTier::ALL {
            let json = serde_json::to_value(tier).unwrap();
            assert_eq!(json, tier.as_str());
        }
        for status in TaskStatus::ALL {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, status.as_str());
        }
    }
}
