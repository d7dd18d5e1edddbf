//! Orchestrator — drives tasks through `pending → routed → running →
//! completed | failed`.
//!
//! Each operation is individually callable and safe to repeat: routing is a
//! one-time commitment guarded by the store, and every execution attempt
//! appends its own model run.

use std::sync::Arc;
use std::time::Instant;

use taskroute_core::{ArtifactStatus, Error, Result, TaskOrigin, TaskStatus, TranscriptStatus};
use taskroute_ingest::Ingester;
use taskroute_router::DecisionEngine;
use taskroute_store::{AuditTrail, NewDecision, NewModelRun, NewTaskRow, RoutingDecision, SqliteStore, Task};
use tracing::{debug, error, info, warn};

use crate::executor::{count_tokens, BackendExecutor, ExecutionRequest};
use crate::types::*;

/// Top-level orchestrator shared by both entry points.
pub struct Orchestrator {
    engine: DecisionEngine,
    executor: Arc<dyn BackendExecutor>,
    max_attempts: u32,
}

impl Orchestrator {
    pub fn new(engine: DecisionEngine, executor: Arc<dyn BackendExecutor>, max_attempts: u32) -> Self {
        let max_attempts = max_attempts.max(1);
        info!(
            "Orchestrator initialized: {} backends, max_attempts={}",
            engine.catalog().backends().len(),
            max_attempts
        );
        Self {
            engine,
            executor,
            max_attempts,
        }
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Validate and persist a `pending` task. Nothing is written when
    /// validation fails.
    pub fn create(&self, store: &SqliteStore, req: NewTask) -> Result<Task> {
        if req.budget_ceiling < 0 {
            return Err(Error::InvalidInput(format!(
                "budget ceiling must be a non-negative integer, got {}",
                req.budget_ceiling
            )));
        }

        let text = match (req.text, &req.content_id) {
            (Some(text), _) if !text.trim().is_empty() => text,
            (_, Some(content_id)) => {
                let transcript = store
                    .get_transcript(content_id)?
                    .ok_or_else(|| Error::NotFound(format!("content {}", content_id)))?;
                if transcript.status != TranscriptStatus::Ready {
                    return Err(Error::InvalidInput(format!(
                        "content {} is {}, not ready",
                        content_id, transcript.status
                    )));
                }
                transcript.text
            }
            _ => return Err(Error::InvalidInput("text is required".into())),
        };

        let task = store.insert_task(&NewTaskRow {
            kind: req.kind,
            sla_tier: req.sla,
            budget_ceiling: req.budget_ceiling,
            input_text: text,
            content_id: req.content_id,
            origin: TaskOrigin::Api,
        })?;
        info!(
            "Created task {} (kind={}, sla={}, budget={})",
            task.id, task.kind, task.sla_tier, task.budget_ceiling
        );
        Ok(task)
    }

    /// Decide the backend and commit the decision. A second call for the
    /// same task fails with `AlreadyRouted` and leaves the first decision
    /// untouched.
    pub fn route(&self, store: &SqliteStore, task_id: &str) -> Result<(Task, RoutingDecision)> {
        let task = store
            .get_task(task_id)?
            .ok_or_else(|| Error::NotFound(format!("task {}", task_id)))?;

        let plan = self
            .engine
            .decide_tier(task.kind.as_str(), task.sla_tier, task.budget_ceiling);
        if plan.over_budget {
            warn!(
                "Task {}: {} costs {} but the ceiling is {}",
                task_id, plan.backend, plan.estimated_cost, task.budget_ceiling
            );
        }

        let (task, decision) = store.record_routing(
            task_id,
            &NewDecision {
                chosen_backend: plan.backend,
                preferred_backend: plan.preferred_backend,
                justification: plan.justification,
                estimated_cost: plan.estimated_cost,
                estimated_latency_ms: plan.estimated_latency_ms,
                over_budget: plan.over_budget,
            },
        )?;
        info!("Routed task {} to {}", task.id, decision.chosen_backend);
        Ok((task, decision))
    }

    /// Run one attempt on the decided backend and append its model run.
    ///
    /// Success completes the task. A transient backend failure leaves the
    /// task `running` with the reason recorded, so the caller may retry; any
    /// other failure moves it to `failed`.
    pub fn execute(&self, store: &SqliteStore, task_id: &str) -> Result<ExecutionOutcome> {
        let task = store
            .get_task(task_id)?
            .ok_or_else(|| Error::NotFound(format!("task {}", task_id)))?;
        if !matches!(task.status, TaskStatus::Routed | TaskStatus::Running) {
            return Err(Error::InvalidTransition {
                from: task.status.to_string(),
                to: TaskStatus::Running.to_string(),
            });
        }
        let decision = store
            .get_decision_for_task(task_id)?
            .ok_or_else(|| Error::NotFound(format!("routing decision for task {}", task_id)))?;

        let Some(backend) = self.engine.catalog().get(&decision.chosen_backend) else {
            let msg = format!("backend {} is no longer in the catalog", decision.chosen_backend);
            store.transition_task(task_id, TaskStatus::Failed, Some(&msg))?;
            error!("Task {} failed: {}", task_id, msg);
            return Err(Error::Config(msg));
        };

        let task = store.transition_task(task_id, TaskStatus::Running, None)?;
        let attempt = store.list_runs_for_task(task_id)?.len() as i64 + 1;
        let request = ExecutionRequest {
            task_id,
            attempt,
            kind: task.kind,
            backend,
            text: &task.input_text,
        };

        let started = Instant::now();
        match self.executor.execute(&request) {
            Ok(output) => {
                let run = store.append_model_run(
                    task_id,
                    &NewModelRun {
                        backend: backend.id.clone(),
                        input_tokens: output.input_tokens,
                        output_tokens: output.output_tokens,
                        latency_ms: output.latency_ms,
                        cost: backend.cost_per_task,
                        success: true,
                        failure_reason: None,
                        output_text: Some(output.output),
                    },
                )?;
                let task = store.transition_task(task_id, TaskStatus::Completed, None)?;
                info!(
                    "Task {} completed on {} (attempt {}, {} ms, cost {})",
                    task_id, run.backend, run.attempt, run.latency_ms, run.cost
                );
                Ok(ExecutionOutcome { task, run })
            }
            Err(e) => {
                let reason = e.to_string();
                let run = store.append_model_run(
                    task_id,
                    &NewModelRun {
                        backend: backend.id.clone(),
                        input_tokens: count_tokens(&task.input_text),
                        output_tokens: 0,
                        latency_ms: started.elapsed().as_millis() as i64,
                        cost: backend.cost_per_task,
                        success: false,
                        failure_reason: Some(reason.clone()),
                        output_text: None,
                    },
                )?;
                if e.is_retryable() {
                    store.transition_task(task_id, TaskStatus::Running, Some(&reason))?;
                    warn!("Task {} attempt {} failed: {}", task_id, run.attempt, reason);
                } else {
                    store.transition_task(task_id, TaskStatus::Failed, Some(&reason))?;
                    error!("Task {} failed: {}", task_id, reason);
                }
                Err(e)
            }
        }
    }

    /// Execute until success or `max_attempts` transient failures, after
    /// which the task is marked `failed`. Returns the resulting audit trail.
    pub fn run_to_completion(&self, store: &SqliteStore, task_id: &str) -> Result<AuditTrail> {
        let mut last_reason = String::new();
        for attempt in 1..=self.max_attempts {
            match self.execute(store, task_id) {
                Ok(_) => return store.audit_trail(task_id),
                Err(e) if e.is_retryable() => {
                    debug!("Task {}: attempt {}/{} failed", task_id, attempt, self.max_attempts);
                    last_reason = e.to_string();
                }
                Err(e) => return Err(e),
            }
        }

        let msg = format!(
            "gave up after {} attempts: {}",
            self.max_attempts, last_reason
        );
        store.transition_task(task_id, TaskStatus::Failed, Some(&msg))?;
        error!("Task {} failed: {}", task_id, msg);
        store.audit_trail(task_id)
    }

    /// Direct entry point: create, route and run a task in one request.
    pub fn submit(&self, store: &SqliteStore, req: NewTask) -> Result<AuditTrail> {
        let task = self.create(store, req)?;
        self.route(store, &task.id)?;
        self.run_to_completion(store, &task.id)
    }

    /// Task, decision and runs for reporting.
    pub fn audit_trail(&self, store: &SqliteStore, task_id: &str) -> Result<AuditTrail> {
        store.audit_trail(task_id)
    }

    /// Workflow entry point: finish extraction for ingested content, then
    /// create, route and run its task.
    ///
    /// Each content has at most one resume task. A repeated trigger for
    /// content whose task has been routed fails with `AlreadyRouted`; a task
    /// left `pending` by an interrupted trigger is picked up again.
    pub fn resume_from_content(
        &self,
        store: &SqliteStore,
        ingester: &Ingester<'_>,
        req: ResumeRequest,
    ) -> Result<PipelineOutcome> {
        if req.budget_ceiling < 0 {
            return Err(Error::InvalidInput(format!(
                "budget ceiling must be a non-negative integer, got {}",
                req.budget_ceiling
            )));
        }

        let transcript = store
            .get_transcript(&req.content_id)?
            .ok_or_else(|| Error::NotFound(format!("content {}", req.content_id)))?;
        let artifact_id = transcript.artifact_id.clone();
        if store.get_artifact(&artifact_id)?.is_none() {
            return Err(Error::NotFound(format!("artifact {}", artifact_id)));
        }
        if let Some(existing) = store.find_resume_task(&req.content_id)? {
            if existing.status != TaskStatus::Pending {
                return Err(Error::AlreadyRouted { task_id: existing.id });
            }
        }
        if transcript.status == TranscriptStatus::Failed {
            return Err(Error::InvalidTransition {
                from: TranscriptStatus::Failed.to_string(),
                to: TranscriptStatus::Ready.to_string(),
            });
        }

        if !store.mark_artifact_processing(&artifact_id)? {
            debug!("Artifact {} already finalised", artifact_id);
        }
        let transcript = ingester.complete_extraction(&req.content_id)?;

        let (task, created) = store.insert_resume_task(&NewTaskRow {
            kind: req.kind,
            sla_tier: req.sla,
            budget_ceiling: req.budget_ceiling,
            input_text: transcript.text.clone(),
            content_id: Some(req.content_id.clone()),
            origin: TaskOrigin::Resume,
        })?;
        if !created {
            if task.status != TaskStatus::Pending {
                return Err(Error::AlreadyRouted { task_id: task.id });
            }
            info!("Recovering pending task {} for content {}", task.id, req.content_id);
        }

        self.route(store, &task.id)?;
        let trail = match self.run_to_completion(store, &task.id) {
            Ok(trail) => trail,
            Err(e) => {
                let msg = e.to_string();
                store.set_artifact_status(&artifact_id, ArtifactStatus::Failed, Some(&msg))?;
                error!("Artifact {} failed: {}", artifact_id, msg);
                return Err(e);
            }
        };

        match trail.task.status {
            TaskStatus::Completed => {
                store.set_artifact_status(&artifact_id, ArtifactStatus::Ready, None)?;
            }
            TaskStatus::Failed => {
                store.set_artifact_status(
                    &artifact_id,
                    ArtifactStatus::Failed,
                    trail.task.error_message.as_deref(),
                )?;
            }
            _ => {}
        }

        let artifact = store
            .get_artifact(&artifact_id)?
            .ok_or_else(|| Error::NotFound(format!("artifact {}", artifact_id)))?;
        Ok(PipelineOutcome {
            artifact,
            transcript,
            trail,
        })
    }
}
