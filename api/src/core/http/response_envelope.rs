use serde::Serialize;

/// Provider-native error shape returned by the Ollama/OpenAI/vLLM-facing
/// endpoints: `{"error": {"message", "type", "param", "code"}}`.
#[derive(Serialize)]
pub struct ProviderErrorBody {
    pub error: ProviderErrorDetail,
}

#[derive(Serialize)]
pub struct ProviderErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub type_: &'static str,
    pub param: Option<&'static str>,
    pub code: &'static str,
}

/// Error shape returned by the builtin utility endpoints:
/// `{"status": false, "body": "..."}`.
#[derive(Serialize)]
pub struct BuiltinErrorBody {
    pub status: bool,
    pub body: String,
}

impl BuiltinErrorBody {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: false,
            body: message.into(),
        }
    }
}
