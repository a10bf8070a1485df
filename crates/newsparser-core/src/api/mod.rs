mod routes;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;

pub type AppState = Arc<AppContext>;

/// HTTP surface for triggering ingestion runs and polling their tasks
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api", get(routes::index))
        .route("/api/health", get(routes::health))
        .route("/api/feeds/fetch", post(routes::manual_fetch))
        .route("/api/feeds/tasks/{task_id}", get(routes::task_status))
        .route("/api/feeds/status", get(routes::scheduler_status))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
}
