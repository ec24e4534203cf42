use thiserror::Error;

/// Mirrors `ai-llm-service::error_handler`'s shape: a non-2xx upstream
/// response, a transport-level failure, or a body that didn't decode as the
/// expected JSON shape.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("[router-http] {status} from {url}: {snippet}")]
    HttpStatus {
        status: reqwest::StatusCode,
        url: String,
        snippet: String,
    },

    #[error("[router-http] transport error calling {url}: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("[router-http] failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

/// Truncates a response body to at most 240 characters for log/error
/// messages, appending an ellipsis if truncated.
pub fn make_snippet(body: &str) -> String {
    const LIMIT: usize = 240;
    if body.chars().count() <= LIMIT {
        return body.to_string();
    }
    let truncated: String = body.chars().take(LIMIT).collect();
    format!("{truncated}…")
}
