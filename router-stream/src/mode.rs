use router_protocol::Family;

/// Which transcoding direction to apply, resolved once per request from the
/// inbound endpoint's family and the acquired provider's family. LM Studio
/// and vLLM are OpenAI-compatible on the wire, so only "is this Ollama"
/// matters for the pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    OpenaiPassthrough,
    OllamaPassthrough,
    OpenaiToOllama,
    OllamaToOpenai,
}

impl StreamMode {
    pub fn resolve(endpoint_family: Family, provider_family: Family) -> Self {
        let endpoint_ollama = matches!(endpoint_family, Family::Ollama);
        let provider_ollama = matches!(provider_family, Family::Ollama);
        match (endpoint_ollama, provider_ollama) {
            (false, false) => Self::OpenaiPassthrough,
            (true, true) => Self::OllamaPassthrough,
            (true, false) => Self::OpenaiToOllama,
            (false, true) => Self::OllamaToOpenai,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lm_studio_endpoint_against_ollama_provider_transcodes() {
        let mode = StreamMode::resolve(Family::LmStudio, Family::Ollama);
        assert_eq!(mode, StreamMode::OllamaToOpenai);
    }

    #[test]
    fn matching_families_pass_through() {
        assert_eq!(
            StreamMode::resolve(Family::Ollama, Family::Ollama),
            StreamMode::OllamaPassthrough
        );
        assert_eq!(
            StreamMode::resolve(Family::OpenAi, Family::Vllm),
            StreamMode::OpenaiPassthrough
        );
    }
}
