//! In-process resume worker — drains ingestion events when no external
//! workflow webhook is configured and resumes each one with the configured
//! defaults.

use std::sync::Arc;

use taskroute_core::{Error, TaskStatus};
use taskroute_ingest::IngestEvent;
use taskroute_runtime::ResumeRequest;
use tracing::{debug, error, info, warn};

use crate::state::AppState;

/// Start the background resume worker. Does nothing when events go to a
/// webhook.
pub fn start_resume_worker(state: Arc<AppState>) {
    let mut rx = match state.take_ingest_rx() {
        Some(rx) => rx,
        None => {
            if state.config.webhook_url.is_none() {
                error!("Resume worker already started");
            }
            return;
        }
    };

    tokio::spawn(async move {
        info!("Background resume worker started");
        while let Some(event) = rx.recv().await {
            let state = state.clone();
            let joined = tokio::task::spawn_blocking(move || process_event(&state, &event)).await;
            if let Err(e) = joined {
                error!("Resume job panicked: {}", e);
            }
        }
        info!("Background resume worker stopped");
    });
}

fn process_event(state: &AppState, event: &IngestEvent) {
    let defaults = &state.config.resume_defaults;
    let req = ResumeRequest {
        content_id: event.content_id.clone(),
        kind: defaults.kind,
        sla: defaults.sla,
        budget_ceiling: defaults.budget,
    };

    let ingester = state.ingester();
    match state.orchestrator.resume_from_content(&state.store, &ingester, req) {
        Ok(outcome) if outcome.trail.task.status == TaskStatus::Completed => {
            info!(
                "Resumed content {} → task {} completed",
                event.content_id, outcome.trail.task.id
            );
        }
        Ok(outcome) => {
            warn!(
                "Resumed content {} → task {} {}",
                event.content_id, outcome.trail.task.id, outcome.trail.task.status
            );
        }
        Err(Error::AlreadyRouted { task_id }) => {
            debug!("Content {} already handled by task {}", event.content_id, task_id);
        }
        Err(e) => {
            error!("Resume failed for content {}: {}", event.content_id, e);
        }
    }
}
