use crate::error::ProtocolError;

/// The wire-protocol dialect an inbound endpoint expects, or an upstream
/// provider speaks. LM Studio is OpenAI-compatible and shares its descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Ollama,
    Vllm,
    OpenAi,
    LmStudio,
    Anthropic,
}

impl Family {
    /// Case-insensitive, whitespace-trimmed parse; unknown strings are a
    /// validation error at the request boundary, not a panic.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "vllm" => Ok(Self::Vllm),
            "openai" => Ok(Self::OpenAi),
            "lmstudio" | "lm-studio" | "lm_studio" => Ok(Self::LmStudio),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(ProtocolError::UnknownFamily(other.to_string())),
        }
    }

    /// vLLM and OpenAI-compatible families (OpenAI, LM Studio) speak the
    /// same chat/completions shape; used by the stream-mode resolver to
    /// decide passthrough vs. transcode.
    pub fn is_openai_compatible(self) -> bool {
        matches!(self, Self::OpenAi | Self::LmStudio | Self::Vllm)
    }
}

impl From<router_config::ApiType> for Family {
    fn from(api_type: router_config::ApiType) -> Self {
        match api_type {
            router_config::ApiType::Ollama => Self::Ollama,
            router_config::ApiType::Vllm => Self::Vllm,
            router_config::ApiType::OpenAi => Self::OpenAi,
            router_config::ApiType::LmStudio => Self::LmStudio,
            router_config::ApiType::Anthropic => Self::Anthropic,
        }
    }
}

/// Static per-family endpoint shape: where the chat and completions routes
/// live upstream, and the HTTP method to use (POST for every family today).
#[derive(Debug, Clone, Copy)]
pub struct Descriptor {
    pub chat_path: &'static str,
    pub completions_path: &'static str,
    pub method: &'static str,
}

impl Descriptor {
    pub fn for_family(family: Family) -> Self {
        match family {
            Family::Ollama => Self {
                chat_path: "/api/chat",
                completions_path: "/api/generate",
                method: "POST",
            },
            Family::Vllm | Family::OpenAi | Family::LmStudio => Self {
                chat_path: "/v1/chat/completions",
                completions_path: "/v1/completions",
                method: "POST",
            },
            Family::Anthropic => Self {
                chat_path: "/v1/messages",
                completions_path: "/v1/messages",
                method: "POST",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive_and_trims_whitespace() {
        assert_eq!(Family::parse(" OpenAI \n").unwrap(), Family::OpenAi);
        assert_eq!(Family::parse("LM-Studio").unwrap(), Family::LmStudio);
    }

    #[test]
    fn unknown_family_is_rejected() {
        let err = Family::parse("made-up").unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownFamily(name) if name == "made-up"));
    }

    #[test]
    fn ollama_and_openai_descriptors_differ() {
        let ollama = Descriptor::for_family(Family::Ollama);
        let openai = Descriptor::for_family(Family::OpenAi);
        assert_eq!(ollama.chat_path, "/api/chat");
        assert_eq!(openai.chat_path, "/v1/chat/completions");
    }
}
