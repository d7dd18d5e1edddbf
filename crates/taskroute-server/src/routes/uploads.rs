//! Upload route — multipart ingestion.

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use taskroute_core::Error;
use taskroute_ingest::{IngestReceipt, Upload, MAX_UPLOAD_BYTES};

use crate::error::ApiResult;
use crate::state::AppState;

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/uploads",
        post(upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD)),
    )
}

/// POST /api/uploads — store the first file field and announce it to the
/// workflow service.
async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<IngestReceipt>)> {
    let mut multipart = multipart?;
    while let Some(field) = multipart.next_field().await? {
        let filename = match field.file_name() {
            Some(name) => name.to_string(),
            None => continue,
        };
        let media_type = field.content_type().map(|m| m.to_string());
        let bytes = field.bytes().await?;

        let receipt = state.ingester().ingest(Upload {
            filename,
            media_type,
            bytes: bytes.to_vec(),
        })?;
        return Ok((StatusCode::CREATED, Json(receipt)));
    }

    Err(Error::InvalidInput("multipart body has no file field".into()).into())
}
