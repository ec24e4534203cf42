use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde_json::{Value, json};
use tracing::warn;

use crate::core::app_state::AppState;

/// `GET /api/version`.
pub async fn version() -> Json<Value> {
    Json(json!({ "version": env!("CARGO_PKG_VERSION") }))
}

/// `GET /api/ping` — 200 iff the coordination store answers a trivial read;
/// 503 otherwise. Never touches a real model lock.
pub async fn ping(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    match state.store.key_get("router:ping").await {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(err) => {
            warn!(error = %err, "coordination store unreachable during ping");
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "unreachable" })))
        }
    }
}
