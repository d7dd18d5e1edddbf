//! Task routes — create, route, execute and inspect tasks.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use taskroute_core::{SlaTier, TaskKind};
use taskroute_runtime::NewTask;

use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", post(create_task))
        .route("/tasks/{id}", get(get_task))
        .route("/tasks/{id}/route", post(route_task))
        .route("/tasks/{id}/execute", post(execute_task))
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskBody {
    #[serde(alias = "taskKind", alias = "task_kind")]
    pub kind: String,
    #[serde(alias = "slaTier", alias = "sla")]
    pub sla_tier: String,
    pub text: Option<String>,
    #[serde(alias = "budgetCeiling", alias = "budget")]
    pub budget_ceiling: i64,
    #[serde(alias = "contentId")]
    pub content_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateQuery {
    /// `create` stops after persisting the pending task.
    pub mode: Option<String>,
}

/// POST /api/tasks — create a task and run it through routing and execution.
async fn create_task(
    State(state): State<Arc<AppState>>,
    query: Result<Query<CreateQuery>, QueryRejection>,
    body: Result<Json<CreateTaskBody>, JsonRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    let Json(body) = body?;

    let req = NewTask {
        kind: body.kind.parse::<TaskKind>()?,
        sla: body.sla_tier.parse::<SlaTier>()?,
        text: body.text,
        budget_ceiling: body.budget_ceiling,
        content_id: body.content_id,
    };

    match query.mode.as_deref() {
        Some("create") => {
            let task = state.orchestrator.create(&state.store, req)?;
            Ok((StatusCode::CREATED, Json(task)).into_response())
        }
        None | Some("run") => {
            let trail = state.orchestrator.submit(&state.store, req)?;
            Ok((StatusCode::CREATED, Json(trail)).into_response())
        }
        Some(other) => Err(taskroute_core::Error::InvalidInput(format!("unknown mode: {}", other)).into()),
    }
}

/// GET /api/tasks/{id} — audit trail for one task.
async fn get_task(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Response> {
    let trail = state.orchestrator.audit_trail(&state.store, &id)?;
    Ok(Json(trail).into_response())
}

/// POST /api/tasks/{id}/route — commit the routing decision.
async fn route_task(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Response> {
    let (task, decision) = state.orchestrator.route(&state.store, &id)?;
    Ok(Json(serde_json::json!({
        "task": task,
        "decision": decision,
    }))
    .into_response())
}

/// POST /api/tasks/{id}/execute — one execution attempt.
async fn execute_task(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Response> {
    let outcome = state.orchestrator.execute(&state.store, &id)?;
    Ok(Json(outcome).into_response())
}
