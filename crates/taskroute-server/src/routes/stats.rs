//! Stats, catalog and health routes.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/backends", get(list_backends))
        .route("/health", get(health))
}

/// GET /api/stats — row counts and spend.
async fn get_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<serde_json::Value>> {
    let stats = state.store.stats()?;
    Ok(Json(serde_json::json!({
        "artifacts": stats.artifacts,
        "transcripts": stats.transcripts,
        "tasks": stats.tasks,
        "tasksByStatus": stats.tasks_by_status,
        "routingDecisions": stats.routing_decisions,
        "modelRuns": stats.model_runs,
        "failedRuns": stats.failed_runs,
        "totalCost": stats.total_cost,
        "dbPath": stats.db_path,
        "maxAttempts": state.orchestrator.max_attempts(),
        "notifier": state.notifier.name(),
    })))
}

/// GET /api/backends — the catalog, most capable first.
async fn list_backends(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let backends = state.orchestrator.engine().catalog().backends();
    Json(serde_json::json!({
        "backends": backends,
        "total": backends.len(),
    }))
}

/// GET /api/health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
