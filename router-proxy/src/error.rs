use thiserror::Error;

/// Errors the pipeline can surface to an HTTP handler. The `api` crate maps
/// each variant to the right response envelope (provider-native
/// `{"error":{...}}` for the Ollama/OpenAI/vLLM-shaped endpoints, or
/// `{"status":false,"body":"..."}` for the builtin utility endpoints) —
/// this crate only classifies the failure, it never picks a status code.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("[router-proxy] missing required parameter \"{0}\"")]
    MissingParam(&'static str),

    #[error("[router-proxy] unknown model \"{0}\"")]
    UnknownModel(String),

    #[error(transparent)]
    Protocol(#[from] router_protocol::ProtocolError),

    #[error(transparent)]
    Handler(#[from] router_handler::HandlerError),

    #[error("[router-proxy] guardrail rejected the request: {0}")]
    GuardrailBlocked(String),

    #[error("[router-proxy] guardrail check failed: {0}")]
    GuardrailFailed(#[from] router_guardrail::GuardrailError),

    #[error("[router-proxy] utils plugin failed: {0}")]
    UtilsFailed(#[from] router_guardrail::UtilsError),

    #[error(transparent)]
    Upstream(#[from] router_http::HttpError),

    #[error("[router-proxy] all {attempts} attempts against upstream providers failed; last error: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl ProxyError {
    /// Whether this failure looks like a "not found" condition for the
    /// purposes of the 404 substring-mapping rule the builtin envelope uses.
    pub fn looks_like_not_found(&self) -> bool {
        matches!(self, ProxyError::UnknownModel(_))
            || matches!(self, ProxyError::Handler(router_handler::HandlerError::UnknownModel(_)))
    }
}
