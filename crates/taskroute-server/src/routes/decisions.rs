//! Routing decision listing.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 200;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/routing-decisions", get(list_decisions))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

/// GET /api/routing-decisions — decisions joined with their tasks, newest first.
async fn list_decisions(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let decisions = state.store.list_decisions_with_tasks(limit)?;
    Ok(Json(serde_json::json!({
        "decisions": decisions,
        "total": decisions.len(),
        "limit": limit,
    })))
}
