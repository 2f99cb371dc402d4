//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection, panic capture)
//! - Optional OpenAPI document (disable with `PROMO_ENABLE_DOCS=false`)
//! - Health route
//! - Marketing generation and task-status routes at the root path
//! - A JSON 404 for anything else

pub mod doc;
mod health;
mod marketing;
mod tasks;

use std::any::Any;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::Uri;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router, middleware};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::warn;

use crate::error::ServerError;
use crate::middleware::{cors, trace};
use crate::state::AppState;

// ── Router builder ────────────────────────────────────────────────────────────

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .merge(marketing::router())
        .merge(tasks::router());

    if state.config.enable_docs {
        let api_doc = doc::get_docs();
        app = app.route(
            "/api-docs/openapi.json",
            get(move || {
                let api_doc = api_doc.clone();
                async move { Json(api_doc) }
            }),
        );
    }

    app.fallback(route_not_found)
        // Outermost layers execute first on the way in.
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(ServiceBuilder::new().layer(cors::cors_layer(&state.config)))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}

async fn route_not_found(uri: Uri) -> ServerError {
    warn!(path = %uri.path(), "route not found");
    ServerError::NotFound("Route not found".to_owned())
}

/// Turn a handler panic into the generic 500 JSON body.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_owned()
    } else {
        "unknown panic payload".to_owned()
    };
    ServerError::Internal(format!("handler panicked: {detail}")).into_response()
}

// ── Tests ──────────────────────────────────────────────────────────────────────
