//! HTTP route handlers.

pub mod decisions;
pub mod pipeline;
pub mod stats;
pub mod tasks;
pub mod uploads;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(stats::routes())
        .merge(tasks::routes())
        .merge(pipeline::routes())
        .merge(decisions::routes())
        .merge(uploads::routes())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use taskroute_core::TaskRouteConfig;
    use taskroute_router::BackendCatalog;
    use taskroute_store::SqliteStore;
    use tower::ServiceExt;

    use crate::state::AppState;

    pub struct TestApp {
        pub state: Arc<AppState>,
        pub router: Router,
        _dir: tempfile::TempDir,
    }

    impl TestApp {
        pub fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let config = TaskRouteConfig::from_lookup(dir.path(), |key| match key {
                "TASKROUTE_JITTER_MS" => Some("0".into()),
                _ => None,
            })
            .unwrap();
            let store = SqliteStore::open(&config.data_paths.db).unwrap();
            let state = Arc::new(AppState::new(config, store, BackendCatalog::default()).unwrap());
            let router = super::build_router(state.clone());
            Self {
                state,
                router,
                _dir: dir,
            }
        }

        pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let json = if bytes.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, json)
        }

        pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
            self.send(Request::get(uri).body(Body::empty()).unwrap()).await
        }

        pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
            self.send(
                Request::post(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
        }
    }
}
