//! Row types for the five persisted entities plus read aggregates.

use serde::{Deserialize, Serialize};
use taskroute_core::{ArtifactStatus, SlaTier, TaskKind, TaskOrigin, TaskStatus, TranscriptStatus};

/// An uploaded artifact row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub original_name: String,
    pub media_type: String,
    pub storage_locator: String,
    pub size_bytes: i64,
    pub status: ArtifactStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

/// Extracted content ("transcript") for one artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub id: String,
    pub artifact_id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    pub is_placeholder: bool,
    pub status: TranscriptStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

/// A task row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub kind: TaskKind,
    pub sla_tier: SlaTier,
    pub budget_ceiling: i64,
    pub input_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    pub origin: TaskOrigin,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

/// The immutable routing decision for a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub id: String,
    pub task_id: String,
    pub chosen_backend: String,
    pub preferred_backend: String,
    pub justification: String,
    pub estimated_cost: i64,
    pub estimated_latency_ms: i64,
    pub over_budget: bool,
    pub created_at: i64,
}

/// One execution attempt ("model run"). Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRun {
    pub id: String,
    pub task_id: String,
    pub decision_id: String,
    pub attempt: i64,
    pub backend: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub latency_ms: i64,
    pub cost: i64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_text: Option<String>,
    pub created_at: i64,
}

/// Fields for a new task row. Status always starts at `pending`.
#[derive(Debug, Clone)]
pub struct NewTaskRow {
    pub kind: TaskKind,
    pub sla_tier: SlaTier,
    pub budget_ceiling: i64,
    pub input_text: String,
    pub content_id: Option<String>,
    pub origin: TaskOrigin,
}

/// Fields for a new routing decision.
#[derive(Debug, Clone)]
pub struct NewDecision {
    pub chosen_backend: String,
    pub preferred_backend: String,
    pub justification: String,
    pub estimated_cost: i64,
    pub estimated_latency_ms: i64,
    pub over_budget: bool,
}

/// Measured outcome of one attempt, before it is assigned an attempt number.
#[derive(Debug, Clone)]
pub struct NewModelRun {
    pub backend: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub latency_ms: i64,
    pub cost: i64,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub output_text: Option<String>,
}

/// Filled-in extraction result for a transcript.
#[derive(Debug, Clone, Default)]
pub struct TranscriptUpdate {
    pub text: String,
    pub language: Option<String>,
    pub duration_ms: Option<i64>,
    pub is_placeholder: bool,
}

/// Task + decision + runs, read as one snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct AuditTrail {
    pub task: Task,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<RoutingDecision>,
    pub runs: Vec<ModelRun>,
}

impl AuditTrail {
    /// The last successful run, if any.
    pub fn final_success(&self) -> Option<&ModelRun> {
        self.runs.iter().rev().find(|r| r.success)
    }
}

/// A routing decision joined with its task, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionWithTask {
    pub decision: RoutingDecision,
    pub task: Task,
}

/// Row counts for the stats endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub artifacts: i64,
    pub transcripts: i64,
    pub tasks: i64,
    pub routing_decisions: i64,
    pub model_runs: i64,
    pub failed_runs: i64,
    pub tasks_by_status: std::collections::BTreeMap<String, i64>,
    pub total_cost: i64,
    pub db_path: String,
}
