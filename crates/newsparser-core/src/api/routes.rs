use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::error;

use super::AppState;
use crate::tasks::TaskStatus;

fn timestamp() -> String {
    Utc::now().to_rfc3339()
}

fn internal_error(context: &str, e: impl std::fmt::Display) -> Response {
    error!("{}: {}", context, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
        .into_response()
}

pub async fn index() -> Json<Value> {
    Json(json!({ "message": "Welcome to the News Parser API!" }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "timestamp": timestamp() }))
}

/// Start a background ingestion run; never waits for it to finish
pub async fn manual_fetch(State(state): State<AppState>) -> Response {
    match state.trigger_manual_fetch().await {
        Ok(task_id) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "status": "started",
                "task_id": task_id,
                "message": "Feed fetch started in the background",
                "timestamp": timestamp(),
            })),
        )
            .into_response(),
        Err(e) => internal_error("Error starting manual feed fetch", e),
    }
}

pub async fn task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Response {
    let task = state.task(&task_id).await;
    if task.status() == TaskStatus::NotFound {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Task not found", "task_id": task_id })),
        )
            .into_response();
    }

    let mut body = match serde_json::to_value(&task) {
        Ok(body) => body,
        Err(e) => return internal_error("Error serializing task", e),
    };
    if let (Some(duration), Some(fields)) = (task.duration_seconds(), body.as_object_mut()) {
        fields.insert("duration_seconds".to_string(), json!(duration));
    }

    Json(json!({ "task": body, "timestamp": timestamp() })).into_response()
}

pub async fn scheduler_status(State(state): State<AppState>) -> Json<Value> {
    let scheduler = state.scheduler();
    let status = if scheduler.is_running().await {
        "running"
    } else {
        "stopped"
    };
    let jobs = scheduler.list_jobs().await;

    Json(json!({
        "status": status,
        "jobs": jobs,
        "timestamp": timestamp(),
    }))
}
