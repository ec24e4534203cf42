//! Thin builtin-utility endpoints: each one builds a fixed system prompt and
//! a payload shape specific to its purpose, then hands off to the same
//! `ProxyPipeline` every chat/completions route uses. None of these stream
//! or touch the guardrail/masking steps any differently than a normal
//! request would — they are payload builders in front of the shared
//! pipeline, not a separate code path.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::{Value, json};

use router_proxy::{PipelineOutcome, prepare_builtin, prepare_openai_chat};

use crate::core::app_state::AppState;
use crate::error_handler::{AppError, Builtin, BuiltinResult};

fn extract_content(body: &Value) -> String {
    body.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

async fn run_single(state: &AppState, model: &str, system_prompt: &str, user_content: &str) -> Result<String, Builtin> {
    let payload = prepare_builtin(model, system_prompt, user_content, json!({}));
    let outcome = state.pipeline.handle(payload).await.map_err(Builtin::from)?;
    match outcome {
        PipelineOutcome::Blocking { body } => Ok(extract_content(&body)),
        PipelineOutcome::Streaming { .. } => {
            Err(Builtin(AppError::Internal("builtin endpoint unexpectedly streamed".to_string())))
        }
    }
}

/// Runs `system_prompt` against each of `texts` independently, mirroring the
/// original `call_for_each_user_msg` behavior for generate-questions/
/// translate/simplify.
async fn run_per_text(
    state: &AppState,
    model: &str,
    system_prompt: &str,
    texts: &[String],
    map_prompt: &[(&str, String)],
) -> Result<Vec<String>, Builtin> {
    let mut out = Vec::with_capacity(texts.len());
    for text in texts {
        let mut payload = prepare_builtin(model, system_prompt, text, json!({}));
        for (key, value) in map_prompt {
            payload.map_prompt.insert((*key).to_string(), value.clone());
        }
        let outcome = state.pipeline.handle(payload).await.map_err(Builtin::from)?;
        match outcome {
            PipelineOutcome::Blocking { body } => out.push(extract_content(&body)),
            PipelineOutcome::Streaming { .. } => {
                return Err(Builtin(AppError::Internal("builtin endpoint unexpectedly streamed".to_string())));
            }
        }
    }
    Ok(out)
}

fn success(body: Value) -> Json<Value> {
    Json(json!({ "status": true, "body": body }))
}

#[derive(Deserialize)]
pub struct ConversationRequest {
    model: String,
    message: String,
}

const SYSTEM_PROMPT_CONVERSATION: &str = "You are a helpful assistant. Answer the user's message directly.";

/// `POST /api/conversation_with_model`.
pub async fn conversation_with_model(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConversationRequest>,
) -> BuiltinResult<Json<Value>> {
    let response = run_single(&state, &req.model, SYSTEM_PROMPT_CONVERSATION, &req.message).await?;
    Ok(success(json!({ "response": response })))
}

#[derive(Deserialize)]
pub struct ExtendedConversationRequest {
    model: String,
    messages: Vec<Value>,
}

const SYSTEM_PROMPT_EXTENDED_CONVERSATION: &str =
    "You are a helpful assistant continuing a multi-turn conversation. Use the full message history for context.";

/// `POST /api/extended_conversation_with_model` — like
/// `conversation_with_model` but carries the whole message history instead
/// of a single turn.
pub async fn extended_conversation_with_model(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExtendedConversationRequest>,
) -> BuiltinResult<Json<Value>> {
    let mut payload = prepare_openai_chat(json!({ "model": req.model, "messages": req.messages })).map_err(Builtin::from)?;
    payload.forced_system_prompt = Some(SYSTEM_PROMPT_EXTENDED_CONVERSATION.to_string());
    let outcome = state.pipeline.handle(payload).await.map_err(Builtin::from)?;
    match outcome {
        PipelineOutcome::Blocking { body } => Ok(success(json!({ "response": extract_content(&body) }))),
        PipelineOutcome::Streaming { .. } => {
            Err(Builtin(AppError::Internal("builtin endpoint unexpectedly streamed".to_string())))
        }
    }
}

#[derive(Deserialize)]
pub struct GenerateQuestionsRequest {
    model: String,
    texts: Vec<String>,
    #[serde(default = "default_question_count")]
    number_of_questions: u32,
}

fn default_question_count() -> u32 {
    3
}

const SYSTEM_PROMPT_GENERATE_QUESTIONS: &str =
    "Generate ##QUESTION_NUM_STR## about the following text, one per line, with no numbering.";

/// `POST /api/generate_questions`.
pub async fn generate_questions(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateQuestionsRequest>,
) -> BuiltinResult<Json<Value>> {
    let count_desc = format!("{} question(s)", req.number_of_questions);
    let map_prompt = [("##QUESTION_NUM_STR##", count_desc)];
    let responses = run_per_text(&state, &req.model, SYSTEM_PROMPT_GENERATE_QUESTIONS, &req.texts, &map_prompt).await?;
    let body: Vec<Value> = req
        .texts
        .iter()
        .zip(responses)
        .map(|(text, questions)| {
            let split: Vec<&str> = questions.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
            json!({ "text": text, "questions": split })
        })
        .collect();
    Ok(success(json!(body)))
}

#[derive(Deserialize)]
pub struct TranslateRequest {
    model: String,
    texts: Vec<String>,
}

const SYSTEM_PROMPT_TRANSLATE: &str = "Translate the following text to Polish. Respond with only the translation, nothing else.";

/// `POST /api/translate`.
pub async fn translate(State(state): State<Arc<AppState>>, Json(req): Json<TranslateRequest>) -> BuiltinResult<Json<Value>> {
    let responses = run_per_text(&state, &req.model, SYSTEM_PROMPT_TRANSLATE, &req.texts, &[]).await?;
    let body: Vec<Value> = req
        .texts
        .iter()
        .zip(responses)
        .map(|(original, translated)| json!({ "original": original, "translated": translated }))
        .collect();
    Ok(success(json!(body)))
}

#[derive(Deserialize)]
pub struct SimplifyTextRequest {
    model: String,
    texts: Vec<String>,
}

const SYSTEM_PROMPT_SIMPLIFY: &str = "Rewrite the following text in simpler language, keeping its meaning intact.";

/// `POST /api/simplify_text`.
pub async fn simplify_text(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SimplifyTextRequest>,
) -> BuiltinResult<Json<Value>> {
    let responses = run_per_text(&state, &req.model, SYSTEM_PROMPT_SIMPLIFY, &req.texts, &[]).await?;
    Ok(success(json!(responses)))
}

#[derive(Deserialize)]
pub struct GenerateArticleRequest {
    model: String,
    texts: Vec<String>,
}

const SYSTEM_PROMPT_GENERATE_ARTICLE: &str = "Write a news article based on the following source text.";

/// `POST /api/generate_article_from_text`.
pub async fn generate_article_from_text(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateArticleRequest>,
) -> BuiltinResult<Json<Value>> {
    let combined = req.texts.join("\n\n");
    let response = run_single(&state, &req.model, SYSTEM_PROMPT_GENERATE_ARTICLE, &combined).await?;
    Ok(success(json!({ "response": response })))
}

#[derive(Deserialize)]
pub struct FullArticleRequest {
    model: String,
    texts: Vec<String>,
}

const SYSTEM_PROMPT_FULL_ARTICLE: &str =
    "Combine the following news snippets into one coherent full-length article, in narrative order.";

/// `POST /api/create_full_article_from_texts`.
pub async fn create_full_article_from_texts(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FullArticleRequest>,
) -> BuiltinResult<Json<Value>> {
    let combined = req
        .texts
        .iter()
        .enumerate()
        .map(|(i, t)| format!("[{}] {}", i + 1, t))
        .collect::<Vec<_>>()
        .join("\n\n");
    let response = run_single(&state, &req.model, SYSTEM_PROMPT_FULL_ARTICLE, &combined).await?;
    Ok(success(json!({ "response": response })))
}

#[derive(Deserialize)]
pub struct GenerativeAnswerRequest {
    model: String,
    context: String,
    question: String,
}

const SYSTEM_PROMPT_GENERATIVE_ANSWER: &str = "Answer the question using only the information given in the context below.";

/// `POST /api/generative_answer`.
pub async fn generative_answer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerativeAnswerRequest>,
) -> BuiltinResult<Json<Value>> {
    let user_content = format!("Context:\n{}\n\nQuestion: {}", req.context, req.question);
    let response = run_single(&state, &req.model, SYSTEM_PROMPT_GENERATIVE_ANSWER, &user_content).await?;
    Ok(success(json!({ "response": response })))
}
