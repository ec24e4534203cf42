use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use router_protocol::tags;

use crate::core::app_state::AppState;

/// `GET /api/tags` — Ollama-style model list.
pub async fn ollama_tags(State(state): State<Arc<AppState>>) -> Json<Value> {
    let models: Vec<Value> = tags(&state.config)
        .into_iter()
        .map(|m| {
            json!({
                "name": m.name,
                "model": m.name,
                "modified_at": chrono::Utc::now().to_rfc3339(),
                "size": 0,
                "digest": "",
                "details": {
                    "format": "gguf",
                    "family": m.family,
                    "families": Value::Null,
                    "parameter_size": "",
                    "quantization_level": "",
                },
            })
        })
        .collect();
    Json(json!({ "models": models }))
}

/// `GET /v1/models` — OpenAI-style model list.
pub async fn openai_models(State(state): State<Arc<AppState>>) -> Json<Value> {
    let created = chrono::Utc::now().timestamp();
    let data: Vec<Value> = tags(&state.config)
        .into_iter()
        .map(|m| {
            json!({
                "id": m.name,
                "object": "model",
                "created": created,
                "owned_by": "router",
            })
        })
        .collect();
    Json(json!({ "object": "list", "data": data }))
}

/// `GET /api/v0/models` — LM-Studio-style model list.
pub async fn lmstudio_models(State(state): State<Arc<AppState>>) -> Json<Value> {
    let data: Vec<Value> = tags(&state.config)
        .into_iter()
        .map(|m| {
            json!({
                "id": m.name,
                "object": "model",
                "type": "llm",
                "publisher": m.family,
                "state": "not-loaded",
            })
        })
        .collect();
    Json(json!({ "object": "list", "data": data }))
}
