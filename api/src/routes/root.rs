/// `GET /` — the Ollama-style liveness banner every Ollama-compatible
/// client probes before anything else.
pub async fn root() -> &'static str {
    "Ollama is running"
}
