use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use serde_json::Value;

use router_proxy::{PipelineOutcome, prepare_ollama_chat, prepare_ollama_generate, prepare_openai_chat, prepare_openai_completions};

use crate::core::app_state::AppState;
use crate::error_handler::AppResult;

fn outcome_into_response(outcome: PipelineOutcome) -> Response {
    match outcome {
        PipelineOutcome::Blocking { body } => (StatusCode::OK, Json(body)).into_response(),
        PipelineOutcome::Streaming { content_type, body } => {
            let stream = body.map(Ok::<_, std::convert::Infallible>);
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from_stream(stream))
                .expect("static headers and an infallible body stream always build")
        }
    }
}

/// `POST /api/chat`.
pub async fn ollama_chat(State(state): State<Arc<AppState>>, Json(raw): Json<Value>) -> AppResult<Response> {
    let payload = prepare_ollama_chat(raw)?;
    let outcome = state.pipeline.handle(payload).await?;
    Ok(outcome_into_response(outcome))
}

/// `POST /api/generate`.
pub async fn ollama_generate(State(state): State<Arc<AppState>>, Json(raw): Json<Value>) -> AppResult<Response> {
    let payload = prepare_ollama_generate(raw)?;
    let outcome = state.pipeline.handle(payload).await?;
    Ok(outcome_into_response(outcome))
}

/// `POST /v1/chat/completions`.
pub async fn openai_chat_completions(State(state): State<Arc<AppState>>, Json(raw): Json<Value>) -> AppResult<Response> {
    let payload = prepare_openai_chat(raw)?;
    let outcome = state.pipeline.handle(payload).await?;
    Ok(outcome_into_response(outcome))
}

/// `POST /v1/completions`.
pub async fn openai_completions(State(state): State<Arc<AppState>>, Json(raw): Json<Value>) -> AppResult<Response> {
    let payload = prepare_openai_completions(raw)?;
    let outcome = state.pipeline.handle(payload).await?;
    Ok(outcome_into_response(outcome))
}
