//! Pipeline resume route — the entry point the workflow service calls once
//! an ingestion has been announced.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use taskroute_core::{SlaTier, TaskKind};
use taskroute_runtime::{PipelineOutcome, ResumeRequest};

use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/pipeline/resume", post(resume))
}

/// Trigger payload. Omitted settings fall back to the configured defaults.
#[derive(Debug, Deserialize)]
pub struct ResumeBody {
    #[serde(alias = "contentId")]
    pub content_id: String,
    #[serde(default, alias = "taskKind", alias = "task_kind")]
    pub kind: Option<String>,
    #[serde(default, alias = "slaTier", alias = "sla")]
    pub sla_tier: Option<String>,
    #[serde(default, alias = "budgetCeiling", alias = "budget")]
    pub budget_ceiling: Option<i64>,
}

/// POST /api/pipeline/resume — extract, route and execute ingested content.
async fn resume(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ResumeBody>, JsonRejection>,
) -> ApiResult<Json<PipelineOutcome>> {
    let Json(body) = body?;
    let defaults = &state.config.resume_defaults;

    let req = ResumeRequest {
        content_id: body.content_id,
        kind: match body.kind {
            Some(kind) => kind.parse::<TaskKind>()?,
            None => defaults.kind,
        },
        sla: match body.sla_tier {
            Some(sla) => sla.parse::<SlaTier>()?,
            None => defaults.sla,
        },
        budget_ceiling: body.budget_ceiling.unwrap_or(defaults.budget),
    };

    let ingester = state.ingester();
    let outcome = state
        .orchestrator
        .resume_from_content(&state.store, &ingester, req)?;
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;
    use taskroute_ingest::Upload;

    use crate::routes::test_support::TestApp;

    fn ingest(app: &TestApp, text: &str) -> String {
        app.state
            .ingester()
            .ingest(Upload {
                filename: "notes.txt".into(),
                media_type: Some("text/plain".into()),
                bytes: text.as_bytes().to_vec(),
            })
            .unwrap()
            .transcript
            .id
    }

    #[tokio::test]
    async fn test_resume_runs_pipeline_once() {
        let app = TestApp::new();
        let content_id = ingest(&app, "Customer opened a ticket about a refund.");

        let (status, body) = app
            .post_json(
                "/api/pipeline/resume",
                json!({
                    "contentId": content_id,
                    "kind": "classification",
                    "sla_tier": "low_latency",
                    "budget_ceiling": 25,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["artifact"]["status"], "ready");
        assert_eq!(body["transcript"]["status"], "ready");
        assert_eq!(body["task"]["status"], "completed");
        assert_eq!(body["task"]["origin"], "resume");
        assert_eq!(body["decision"]["chosen_backend"], "fast-llm");
        assert_eq!(body["runs"][0]["output_text"], "support");

        let (status, body) = app
            .post_json("/api/pipeline/resume", json!({ "content_id": content_id }))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "already_routed");
        assert_eq!(app.state.store.stats().unwrap().routing_decisions, 1);
    }

    #[tokio::test]
    async fn test_resume_uses_defaults() {
        let app = TestApp::new();
        let content_id = ingest(&app, "First point. Second point. Third point.");

        let (status, body) = app
            .post_json("/api/pipeline/resume", json!({ "content_id": content_id }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["task"]["kind"], "summary");
        assert_eq!(body["task"]["sla_tier"], "low_cost");
        assert_eq!(body["task"]["budget_ceiling"], 10);
        assert_eq!(body["runs"][0]["output_text"], "First point. Second point.");
    }

    #[tokio::test]
    async fn test_resume_unknown_content() {
        let app = TestApp::new();
        let (status, body) = app
            .post_json("/api/pipeline/resume", json!({ "content_id": "missing" }))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "not_found");
    }

    #[tokio::test]
    async fn test_resume_requires_content_id() {
        let app = TestApp::new();
        let (status, body) = app.post_json("/api/pipeline/resume", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "invalid_input");
    }
}
