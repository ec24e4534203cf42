use serde::{Deserialize, Serialize};

/// Wire protocol family a provider speaks (and, separately, what an inbound
/// endpoint expects).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiType {
    Ollama,
    Vllm,
    OpenAi,
    #[serde(rename = "lmstudio")]
    LmStudio,
    Anthropic,
}

impl ApiType {
    /// Case-insensitive, whitespace-trimmed parse, matching the leniency the
    /// original dispatcher affords inbound family strings.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "vllm" => Some(Self::Vllm),
            "openai" => Some(Self::OpenAi),
            "lmstudio" | "lm-studio" | "lm_studio" => Some(Self::LmStudio),
            "anthropic" => Some(Self::Anthropic),
            _ => None,
        }
    }
}

/// An addressable upstream inference endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub api_host: String,
    #[serde(default)]
    pub api_token: String,
    pub api_type: ApiType,
    #[serde(default)]
    pub input_size: u64,
    #[serde(default)]
    pub model_path: Option<String>,
    #[serde(default = "default_weight")]
    pub weight: f32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub order: u32,
    /// Idle-warmup duration string (`"45m"`, `"2h"`, ...). Unparseable or
    /// absent means "do not keep this provider warm".
    #[serde(default)]
    pub keep_alive: Option<String>,
}

fn default_weight() -> f32 {
    1.0
}

fn default_enabled() -> bool {
    true
}

impl Provider {
    /// The physical host this provider lives on, used by the host-affinity
    /// strategy and the keep-alive scheduler's occupancy map.
    pub fn host(&self) -> &str {
        &self.api_host
    }

    /// The remote model identifier to send upstream: `model_path` if set,
    /// otherwise the logical model name.
    pub fn remote_model_name<'a>(&'a self, logical_name: &'a str) -> &'a str {
        self.model_path.as_deref().unwrap_or(logical_name)
    }
}

/// A logical name exposed to clients (e.g. `gpt-3.5-turbo`), fronting one or
/// more providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    #[serde(default)]
    pub family: String,
    pub providers: Vec<Provider>,
}

impl Model {
    /// Providers with `enabled=true`, ordered by `order` then list position.
    pub fn enabled_providers(&self) -> Vec<&Provider> {
        let mut out: Vec<&Provider> = self.providers.iter().filter(|p| p.enabled).collect();
        out.sort_by_key(|p| p.order);
        out
    }
}
