//! Shared helpers for the integration tests
//!
//! The helpers in this module run without PostgreSQL or an LLM key: the state
//! is built with no pool, so database-backed routes answer 503. The
//! `database` module covers tests that need a real pool.

#![allow(dead_code)]

pub mod database;

use axum::{body::Body, http::Request, response::Response, Router};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crosslearn::backend::routes::create_router;
use crosslearn::backend::server::state::AppState;
use crosslearn::shared::{AppConfig, ServerEvent};

pub const TEST_SECRET: &str = "integration-test-secret";

pub fn test_config() -> AppConfig {
    AppConfig::builder()
        .jwt_secret(TEST_SECRET)
        .build()
        .expect("valid test config")
}

pub fn test_state(config: AppConfig) -> AppState {
    AppState::new(config, None)
}

pub fn test_app(config: AppConfig) -> Router {
    create_router(test_state(config))
}

/// A signed token for a user that does not exist in any database.
pub fn token_for(state: &AppState, email: &str) -> String {
    state.tokens.issue(Uuid::new_v4(), email).expect("token")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request")
}

pub fn get_with_bearer(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .expect("request")
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

/// Drain every event currently queued for a test connection, as JSON.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<Value> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(serde_json::to_value(&event).expect("event json"));
    }
    events
}
