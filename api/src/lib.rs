pub mod core;
pub mod error_handler;
pub mod middleware_layer;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use core::app_state::AppState;

/// Builds the full HTTP surface, wired to `state`.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::root::root))
        .route("/api/tags", get(routes::listing::ollama_tags))
        .route("/v1/models", get(routes::listing::openai_models))
        .route("/api/v0/models", get(routes::listing::lmstudio_models))
        .route("/api/chat", post(routes::chat::ollama_chat))
        .route("/api/generate", post(routes::chat::ollama_generate))
        .route("/v1/chat/completions", post(routes::chat::openai_chat_completions))
        .route("/v1/completions", post(routes::chat::openai_completions))
        .route("/api/version", get(routes::diagnostics::version))
        .route("/api/ping", get(routes::diagnostics::ping))
        .route("/api/conversation_with_model", post(routes::builtin::conversation_with_model))
        .route(
            "/api/extended_conversation_with_model",
            post(routes::builtin::extended_conversation_with_model),
        )
        .route("/api/generate_questions", post(routes::builtin::generate_questions))
        .route("/api/translate", post(routes::builtin::translate))
        .route("/api/simplify_text", post(routes::builtin::simplify_text))
        .route("/api/generate_article_from_text", post(routes::builtin::generate_article_from_text))
        .route(
            "/api/create_full_article_from_texts",
            post(routes::builtin::create_full_article_from_texts),
        )
        .route("/api/generative_answer", post(routes::builtin::generative_answer))
        .layer(axum::middleware::from_fn(middleware_layer::json_extractor::json_error_mapper))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds and serves the router on `addr` until the process is killed.
/// Returns only on a bind/accept failure.
pub async fn start(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let router = build_router(Arc::new(state));
    info!(%addr, "router listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}
