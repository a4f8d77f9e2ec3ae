//! Error types for the gateway.
//!
//! [`GatewayError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.
//! Rejected transitions are not errors and never reach this type.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use siege_core::EngineError;

/// Errors that can occur in the gateway layer.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The request body could not be understood.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The attack-state engine is not running.
    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

impl From<EngineError> for GatewayError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unavailable(msg) => Self::Unavailable(msg),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
