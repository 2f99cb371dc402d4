//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors become a JSON `{"error": ...}`
//! body with a matching status code. Internal failures are logged in full
//! and answered with a generic message.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use promo_core::RuntimeError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

pub const INTERNAL_MESSAGE: &str = "Internal server error";

/// All errors that can occur in the promo-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the orchestration core.
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// The caller referenced a resource that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The request body was refused before reaching a handler (too large,
    /// wrong content type, not JSON). Keeps the extractor's status code.
    #[error("request rejected ({status}): {message}")]
    Rejected { status: StatusCode, message: String },

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl ServerError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::Rejected { status, message } => (*status, message.clone()),
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_owned())
            }
            ServerError::Runtime(e) => match e {
                RuntimeError::MissingField { .. } => (StatusCode::BAD_REQUEST, e.to_string()),
                RuntimeError::InvalidParams { message } => {
                    (StatusCode::BAD_REQUEST, message.clone())
                }
                RuntimeError::SessionNotFound { .. } => (
                    StatusCode::NOT_FOUND,
                    "Session expired or not found".to_owned(),
                ),
                RuntimeError::ContentNotFound { .. } => (
                    StatusCode::NOT_FOUND,
                    "Original content not found".to_owned(),
                ),
                RuntimeError::UnknownTask { .. } => {
                    (StatusCode::NOT_FOUND, "Task not found".to_owned())
                }
                RuntimeError::QueueFull { capacity } => {
                    warn!(capacity, "rejecting submission: worker queue full");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "Server is busy, please retry later".to_owned(),
                    )
                }
                RuntimeError::DuplicateTask { .. } | RuntimeError::Shutdown => {
                    error!(error = %e, "orchestration runtime error");
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_owned())
                }
            },
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = self.status_and_message();
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ServerError) -> (StatusCode, String) {
        err.status_and_message()
    }

    #[test]
    fn runtime_errors_map_to_client_messages() {
        assert_eq!(
            status_of(RuntimeError::MissingField { field: "logo" }.into()),
            (StatusCode::BAD_REQUEST, "Missing required field: logo".to_owned())
        );
        assert_eq!(
            status_of(RuntimeError::SessionNotFound { root: "r".into() }.into()),
            (StatusCode::NOT_FOUND, "Session expired or not found".to_owned())
        );
        assert_eq!(
            status_of(RuntimeError::ContentNotFound { root: "r".into() }.into()),
            (StatusCode::NOT_FOUND, "Original content not found".to_owned())
        );
        assert_eq!(
            status_of(RuntimeError::UnknownTask { token: "t".into() }.into()).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(RuntimeError::QueueFull { capacity: 4 }.into()).0,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn internal_detail_is_not_exposed() {
        let (status, message) = status_of(ServerError::Internal("db at /var/secret".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, INTERNAL_MESSAGE);

        let (_, message) = status_of(RuntimeError::Shutdown.into());
        assert_eq!(message, INTERNAL_MESSAGE);
    }
}
