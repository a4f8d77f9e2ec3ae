//! Axum router construction for the gateway.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS and request tracing.

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /health` -- liveness and headline state
/// - `GET /ws` -- `WebSocket` observer stream
/// - `GET /api/state` -- full attack state
/// - `GET /api/history` -- episode history
/// - `POST /api/attack` -- start an attack
/// - `POST /api/defend` -- stop the running attack
/// - `POST /api/reset` -- return to `SECURE`
pub fn build_router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/ws", get(ws::ws_handler))
        .route("/api/state", get(handlers::get_state))
        .route("/api/history", get(handlers::get_history))
        .route("/api/attack", post(handlers::attack))
        .route("/api/defend", post(handlers::defend))
        .route("/api/reset", post(handlers::reset))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy for the configured origins.
///
/// An empty list, or one containing `*`, allows any origin without
/// credentials. Otherwise only the listed origins are allowed, with
/// credentials.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o.trim() == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%origin, "Ignoring invalid CORS origin: {e}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}
