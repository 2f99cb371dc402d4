//! Generation and regeneration endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use axum::{Json, Router};
use promo_core::MarketingParams;
use serde_json::Value;
use tracing::info;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::marketing::{
    GenerateMarketingRequest, RegenerateContentRequest, RegenerateImageRequest, SubmittedResponse,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(generate_marketing_content, regenerate_content, regenerate_image),
    components(schemas(GenerateMarketingRequest, RegenerateImageRequest, SubmittedResponse))
)]
pub struct MarketingApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate-marketing-content", post(generate_marketing_content))
        .route("/regenerate-content", post(regenerate_content))
        .route("/regenerate-image", post(regenerate_image))
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// Start generating copy and an image; returns a task id to poll.
#[utoipa::path(
    post,
    path = "/generate-marketing-content",
    tag = "marketing",
    request_body = GenerateMarketingRequest,
    responses(
        (status = 200, description = "Generation queued", body = SubmittedResponse),
        (status = 400, description = "Missing or malformed field"),
        (status = 413, description = "Body above PROMO_MAX_BODY_BYTES"),
        (status = 503, description = "Worker queue full"),
    )
)]
pub async fn generate_marketing_content(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SubmittedResponse>, ServerError> {
    let Json(body) = body?;
    let params = MarketingParams::from_json(body)?;
    let platforms = params.platform.names().join(",");
    let task_id = state.orchestrator.submit_generation(params).await?;
    info!(task_id = %task_id, platforms = %platforms, "marketing generation accepted");
    Ok(Json(SubmittedResponse::processing(task_id)))
}

/// Regenerate only the copy, overriding any of the original fields.
#[utoipa::path(
    post,
    path = "/regenerate-content",
    tag = "marketing",
    request_body(
        content = Value,
        description = "`task_id` of the original request plus the fields to override"
    ),
    responses(
        (status = 200, description = "Regeneration queued", body = SubmittedResponse),
        (status = 400, description = "Missing task_id"),
        (status = 404, description = "Session expired or not found"),
        (status = 503, description = "Worker queue full"),
    )
)]
pub async fn regenerate_content(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SubmittedResponse>, ServerError> {
    let Json(body) = body?;
    let req = RegenerateContentRequest::from_json(body)?;
    let task_id = state
        .orchestrator
        .regenerate_content(&req.task_id, req.overrides)
        .await?;
    Ok(Json(SubmittedResponse::processing(task_id)))
}

/// Regenerate only the image from the original content, optionally with a new logo.
#[utoipa::path(
    post,
    path = "/regenerate-image",
    tag = "marketing",
    request_body = RegenerateImageRequest,
    responses(
        (status = 200, description = "Regeneration queued", body = SubmittedResponse),
        (status = 400, description = "Missing task_id"),
        (status = 404, description = "Session expired or not found, or original content not found"),
        (status = 503, description = "Worker queue full"),
    )
)]
pub async fn regenerate_image(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SubmittedResponse>, ServerError> {
    let Json(body) = body?;
    let req = RegenerateImageRequest::from_json(body)?;
    let task_id = state
        .orchestrator
        .regenerate_image(&req.task_id, req.logo)
        .await?;
    Ok(Json(SubmittedResponse::processing(task_id)))
}
