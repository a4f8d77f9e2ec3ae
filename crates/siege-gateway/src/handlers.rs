//! REST endpoint handlers.
//!
//! Every handler is a thin adapter: it turns the request into an engine
//! call and the engine's answer into JSON. Commands issued from a phase
//! where they do nothing still succeed, with `"applied": false`.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness plus headline state |
//! | `GET` | `/api/state` | Full attack state and observer count |
//! | `GET` | `/api/history` | Episode history |
//! | `POST` | `/api/attack` | Start an attack |
//! | `POST` | `/api/defend` | Defend against the running attack |
//! | `POST` | `/api/reset` | Return to `SECURE` |

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::de::DeserializeOwned;
use siege_core::store::{Effect, NoOpReason};
use siege_types::{AttackRequest, DefendRequest, Phase};

use crate::error::GatewayError;
use crate::state::AppState;

/// Parse an optional JSON body; an empty body means "all defaults".
fn parse_body<T>(body: &Bytes) -> Result<T, GatewayError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| GatewayError::InvalidRequest(format!("malformed JSON body: {e}")))
}

/// Human-readable summary of a command's effect.
const fn describe(effect: &Effect) -> &'static str {
    match effect {
        Effect::AttackStarted { .. } => "Attack triggered globally",
        Effect::AttackStopped { .. } => "Attack stopped globally",
        Effect::Reset { .. } => "System reset globally",
        Effect::Compromised { .. } => "System compromised",
        Effect::Ticked { .. } => "Countdown advanced",
        Effect::NoOp(NoOpReason::AlreadyUnderAttack) => "Attack already in progress",
        Effect::NoOp(NoOpReason::AlreadyCompromised) => "System compromised; reset required",
        Effect::NoOp(NoOpReason::NotUnderAttack) => "No attack in progress",
        Effect::NoOp(NoOpReason::StaleTick) => "No state change",
    }
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// Report liveness, connected users, and whether an attack is running.
pub async fn health(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, GatewayError> {
    let view = state.engine.query_state().await?;

    Ok(Json(serde_json::json!({
        "status": "ok",
        "message": "Siege backend is running",
        "timestamp": Utc::now().to_rfc3339(),
        "uptimeSeconds": state.uptime_seconds(),
        "users": view.total_users,
        "phase": view.phase,
        "underAttack": view.phase == Phase::UnderAttack,
    })))
}

// ---------------------------------------------------------------------------
// GET /api/state
// ---------------------------------------------------------------------------

/// Return the full attack state plus the connected-observer count.
pub async fn get_state(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, GatewayError> {
    let view = state.engine.query_state().await?;
    Ok(Json(view))
}

// ---------------------------------------------------------------------------
// GET /api/history
// ---------------------------------------------------------------------------

/// Return the episode history, oldest first.
pub async fn get_history(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, GatewayError> {
    let view = state.engine.query_state().await?;
    Ok(Json(serde_json::json!({
        "count": view.history.len(),
        "records": view.history,
    })))
}

// ---------------------------------------------------------------------------
// POST /api/attack
// ---------------------------------------------------------------------------

/// Start an attack. The body (`{"attackerId", "attackType"}`) is optional.
///
/// Always answers with the current state, whether or not this call
/// started the episode.
pub async fn attack(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, GatewayError> {
    let request: AttackRequest = parse_body(&body)?;
    let outcome = state.engine.attack(&request).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "applied": outcome.applied(),
        "message": describe(&outcome.effect),
        "state": outcome.view,
    })))
}

// ---------------------------------------------------------------------------
// POST /api/defend
// ---------------------------------------------------------------------------

/// Defend against the running attack. The body (`{"defenderId"}`) is
/// optional.
pub async fn defend(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, GatewayError> {
    let request: DefendRequest = parse_body(&body)?;
    let outcome = state.engine.defend(&request).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "applied": outcome.applied(),
        "message": describe(&outcome.effect),
    })))
}

// ---------------------------------------------------------------------------
// POST /api/reset
// ---------------------------------------------------------------------------

/// Return the system to `SECURE` from any phase.
pub async fn reset(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, GatewayError> {
    let outcome = state.engine.reset().await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": describe(&outcome.effect),
    })))
}
