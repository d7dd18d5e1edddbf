//! Runtime types.

use serde::Serialize;
use taskroute_core::{SlaTier, TaskKind};
use taskroute_store::{Artifact, AuditTrail, ModelRun, Task, Transcript};

/// Request to create a task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub kind: TaskKind,
    pub sla: SlaTier,
    /// Input text. Required unless `content_id` points at ready content.
    pub text: Option<String>,
    pub budget_ceiling: i64,
    pub content_id: Option<String>,
}

/// Trigger payload for resuming an ingested artifact.
#[derive(Debug, Clone)]
pub struct ResumeRequest {
    pub content_id: String,
    pub kind: TaskKind,
    pub sla: SlaTier,
    pub budget_ceiling: i64,
}

/// Task and run produced by one execution attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutcome {
    pub task: Task,
    pub run: ModelRun,
}

/// Everything touched by a resumed pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub artifact: Artifact,
    pub transcript: Transcript,
    #[serde(flatten)]
    pub trail: AuditTrail,
}
