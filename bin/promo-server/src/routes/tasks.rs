//! Task polling endpoint.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::task::{ContentView, ProgressView, ResultView, StatusResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(check_status),
    components(schemas(StatusResponse, ProgressView, ResultView, ContentView))
)]
pub struct TasksApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/check-status/{task_id}", get(check_status))
}

/// Report progress or the outcome of a task.
///
/// A finished task that is not the root of a live session can be read once;
/// afterwards it is reported as not found.
#[utoipa::path(
    get,
    path = "/check-status/{task_id}",
    tag = "tasks",
    params(("task_id" = String, Path, description = "Task identifier")),
    responses(
        (status = 200, description = "Task status", body = StatusResponse),
        (status = 404, description = "Task not found"),
    )
)]
pub async fn check_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<StatusResponse>, ServerError> {
    let report = state.orchestrator.check_status(&task_id).await?;
    Ok(Json(report.into()))
}
