//! Integration tests for the gateway REST endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. This validates handler logic and routing
//! without needing a live network connection.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use siege_core::clock::MonotonicClock;
use siege_core::{spawn_engine, EngineSettings};
use siege_gateway::router::build_router;
use siege_gateway::state::AppState;
use tower::ServiceExt;

fn make_app() -> (Router, Arc<AppState>) {
    let settings = EngineSettings {
        timer_ceiling: 3600,
        tick_interval: Duration::from_secs(1),
        max_history: 100,
        broadcast_capacity: 64,
        mailbox_capacity: 16,
    };
    let (engine, _task) = spawn_engine(&settings, Arc::new(MonotonicClock::new()));
    let state = Arc::new(AppState::new(engine));
    let router = build_router(Arc::clone(&state), &[String::from("http://localhost:3000")]);
    (router, state)
}

async fn body_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(app: &Router, path: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::get(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, body_json(response.into_body()).await)
}

async fn post(app: &Router, path: &str, body: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::post(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_owned()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, body_json(response.into_body()).await)
}

#[tokio::test]
async fn health_reports_secure_at_startup() {
    let (app, _state) = make_app();

    let (status, json) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["underAttack"], false);
    assert_eq!(json["phase"], "SECURE");
    assert_eq!(json["users"], 0);
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn state_starts_secure_with_full_timer() {
    let (app, _state) = make_app();

    let (status, json) = get(&app, "/api/state").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["phase"], "SECURE");
    assert_eq!(json["timeRemaining"], 3600);
    assert_eq!(json["timerCeiling"], 3600);
    assert_eq!(json["activeAttackers"], serde_json::json!([]));
    assert_eq!(json["history"], serde_json::json!([]));
    assert_eq!(json["totalUsers"], 0);
}

#[tokio::test]
async fn attack_starts_an_episode() {
    let (app, _state) = make_app();

    let (status, json) = post(
        &app,
        "/api/attack",
        r#"{"attackerId":"mallory","attackType":"ddos"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["applied"], true);
    assert_eq!(json["state"]["phase"], "UNDER_ATTACK");
    assert_eq!(json["state"]["timeRemaining"], 3600);
    assert_eq!(json["state"]["activeAttackers"], serde_json::json!(["mallory"]));

    let history = &json["state"]["history"];
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["attackerId"], "mallory");
    assert_eq!(history[0]["attackType"], "ddos");
    assert!(history[0]["durationSeconds"].is_null());
}

#[tokio::test]
async fn second_attack_is_accepted_without_change() {
    let (app, _state) = make_app();
    post(&app, "/api/attack", r#"{"attackerId":"a"}"#).await;

    let (status, json) = post(&app, "/api/attack", r#"{"attackerId":"b"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["applied"], false);
    assert_eq!(json["state"]["activeAttackers"], serde_json::json!(["a"]));
    assert_eq!(json["state"]["history"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn attack_with_empty_body_uses_defaults() {
    let (app, _state) = make_app();

    let (status, json) = post(&app, "/api/attack", "").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["applied"], true);
    assert_eq!(json["state"]["history"][0]["attackerId"], "anonymous");
    assert_eq!(json["state"]["history"][0]["attackType"], "manual");
}

#[tokio::test]
async fn attack_with_non_string_ids_uses_defaults() {
    let (app, _state) = make_app();

    let (status, json) = post(&app, "/api/attack", r#"{"attackerId":42}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"]["history"][0]["attackerId"], "anonymous");
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let (app, _state) = make_app();

    let (status, json) = post(&app, "/api/attack", "{not json").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], 400);
    assert!(json["error"].as_str().unwrap().contains("malformed"));

    let (_, state) = get(&app, "/api/state").await;
    assert_eq!(state["phase"], "SECURE");
}

#[tokio::test]
async fn defend_closes_the_episode() {
    let (app, _state) = make_app();
    post(&app, "/api/attack", r#"{"attackerId":"mallory"}"#).await;

    let (status, json) = post(&app, "/api/defend", r#"{"defenderId":"alice"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["applied"], true);

    let (_, state) = get(&app, "/api/state").await;
    assert_eq!(state["phase"], "SECURE");
    assert_eq!(state["timeRemaining"], 3600);
    assert_eq!(state["activeAttackers"], serde_json::json!([]));
    assert_eq!(state["history"][0]["outcome"], "DEFENDED");
    assert_eq!(state["history"][0]["closedBy"], "alice");
    assert!(state["history"][0]["durationSeconds"].is_number());
}

#[tokio::test]
async fn defend_without_attack_is_a_noop() {
    let (app, _state) = make_app();

    let (status, json) = post(&app, "/api/defend", "").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["applied"], false);
    assert_eq!(json["message"], "No attack in progress");
}

#[tokio::test]
async fn reset_returns_to_secure_and_keeps_history() {
    let (app, _state) = make_app();
    post(&app, "/api/attack", r#"{"attackerId":"mallory"}"#).await;

    let (status, json) = post(&app, "/api/reset", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let (_, history) = get(&app, "/api/history").await;
    assert_eq!(history["count"], 1);
    assert_eq!(history["records"][0]["outcome"], "RESET");

    let (_, state) = get(&app, "/api/state").await;
    assert_eq!(state["phase"], "SECURE");
    assert_eq!(state["timeRemaining"], 3600);
}

#[tokio::test]
async fn history_lists_episodes_in_order() {
    let (app, _state) = make_app();
    for who in ["first", "second"] {
        post(&app, "/api/attack", &format!(r#"{{"attackerId":"{who}"}}"#)).await;
        post(&app, "/api/defend", "").await;
    }

    let (status, json) = get(&app, "/api/history").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    assert_eq!(json["records"][0]["attackerId"], "first");
    assert_eq!(json["records"][1]["attackerId"], "second");
    assert_eq!(json["records"][1]["closedBy"], "anonymous");
}

#[tokio::test]
async fn observers_show_up_in_health() {
    let (app, state) = make_app();
    let sessions = state.engine.sessions();
    let observer = sessions.connect();

    let (_, json) = get(&app, "/health").await;
    assert_eq!(json["users"], 1);

    sessions.disconnect(observer.connection_id);
    let (_, json) = get(&app, "/health").await;
    assert_eq!(json["users"], 0);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let (app, _state) = make_app();

    let response = app
        .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
