//! Step 1 of the pipeline: turns whatever shape a client posted into the
//! normalized internal payload every later step operates on, and the small
//! set of step 8/9 adjustments (parameter whitelisting, system-prompt
//! resolution) that operate on it before dispatch.

use std::collections::HashMap;

use serde_json::{Map, Value};

use router_protocol::Family;

use crate::error::ProxyError;

/// Which inbound shape produced this payload — decides how the response is
/// eventually re-shaped if the provider speaks a different family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    OllamaChat,
    OllamaGenerate,
    OpenAiChat,
    OpenAiCompletions,
}

impl EndpointKind {
    pub fn family(self) -> Family {
        match self {
            EndpointKind::OllamaChat | EndpointKind::OllamaGenerate => Family::Ollama,
            EndpointKind::OpenAiChat | EndpointKind::OpenAiCompletions => Family::OpenAi,
        }
    }

    pub fn is_chat(self) -> bool {
        matches!(self, EndpointKind::OllamaChat | EndpointKind::OpenAiChat)
    }
}

/// The normalized shape every later pipeline step reads and mutates. Built
/// once in step 1, mutated in place by utils plugins, the guardrail, and the
/// masker, then torn back down into a wire payload at dispatch time.
#[derive(Debug, Clone)]
pub struct NormalizedPayload {
    pub endpoint: EndpointKind,
    pub model: String,
    pub stream: bool,
    /// `messages` (chat) or `prompt` (completions) plus every generation
    /// parameter the client sent, already stripped of the router-only keys
    /// consumed below.
    pub body: Value,
    pub language: String,
    pub map_prompt: HashMap<String, String>,
    pub forced_system_prompt: Option<String>,
    pub postfix_system_prompt: Option<String>,
    /// Set by a builtin-utility caller that wants the guardrail step
    /// skipped entirely, when configured and the endpoint does not opt out.
    pub skip_guardrail: bool,
    /// Set by a caller that wants masking applied even when it isn't
    /// globally enabled — opted in by the payload itself.
    pub mask_opt_in: bool,
}

fn default_language() -> String {
    "pl".to_string()
}

fn take_string_map(obj: &mut Map<String, Value>, key: &str) -> HashMap<String, String> {
    match obj.remove(key) {
        Some(Value::Object(m)) => m
            .into_iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
            .collect(),
        _ => HashMap::new(),
    }
}

fn take_string(obj: &mut Map<String, Value>, key: &str) -> Option<String> {
    obj.remove(key).and_then(|v| v.as_str().map(str::to_string))
}

fn take_bool(obj: &mut Map<String, Value>, key: &str) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Extracts the router-only control keys (`map_prompt`,
/// `prompt_str_force`, `prompt_str_postfix`, `language`, `skip_guardrail`,
/// `mask`) that ride alongside generation parameters in the inbound body,
/// leaving the rest untouched for upstream dispatch.
fn extract_controls(obj: &mut Map<String, Value>) -> (String, HashMap<String, String>, Option<String>, Option<String>, bool, bool) {
    let language = take_string(obj, "language").unwrap_or_else(default_language);
    let map_prompt = take_string_map(obj, "map_prompt");
    let forced = take_string(obj, "prompt_str_force");
    let postfix = take_string(obj, "prompt_str_postfix");
    let skip_guardrail = take_bool(obj, "skip_guardrail");
    let mask_opt_in = take_bool(obj, "mask");
    (language, map_prompt, forced, postfix, skip_guardrail, mask_opt_in)
}

fn require_object(raw: Value) -> Result<Map<String, Value>, ProxyError> {
    match raw {
        Value::Object(map) => Ok(map),
        _ => Err(ProxyError::MissingParam("body")),
    }
}

fn require_model(obj: &Map<String, Value>) -> Result<String, ProxyError> {
    obj.get("model")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ProxyError::MissingParam("model"))
}

fn require_key(obj: &Map<String, Value>, key: &'static str) -> Result<(), ProxyError> {
    if obj.contains_key(key) {
        Ok(())
    } else {
        Err(ProxyError::MissingParam(key))
    }
}

/// `POST /api/chat` — Ollama-style, `messages` array, `stream` defaults to
/// `true` (Ollama's own default) when absent.
pub fn prepare_ollama_chat(raw: Value) -> Result<NormalizedPayload, ProxyError> {
    let mut obj = require_object(raw)?;
    let model = require_model(&obj)?;
    require_key(&obj, "messages")?;
    let stream = obj.get("stream").and_then(Value::as_bool).unwrap_or(true);
    let (language, map_prompt, forced_system_prompt, postfix_system_prompt, skip_guardrail, mask_opt_in) =
        extract_controls(&mut obj);
    Ok(NormalizedPayload {
        endpoint: EndpointKind::OllamaChat,
        model,
        stream,
        body: Value::Object(obj),
        language,
        map_prompt,
        forced_system_prompt,
        postfix_system_prompt,
        skip_guardrail,
        mask_opt_in,
    })
}

/// `POST /api/generate` — Ollama-style, `prompt` string.
pub fn prepare_ollama_generate(raw: Value) -> Result<NormalizedPayload, ProxyError> {
    let mut obj = require_object(raw)?;
    let model = require_model(&obj)?;
    require_key(&obj, "prompt")?;
    let stream = obj.get("stream").and_then(Value::as_bool).unwrap_or(true);
    let (language, map_prompt, forced_system_prompt, postfix_system_prompt, skip_guardrail, mask_opt_in) =
        extract_controls(&mut obj);
    Ok(NormalizedPayload {
        endpoint: EndpointKind::OllamaGenerate,
        model,
        stream,
        body: Value::Object(obj),
        language,
        map_prompt,
        forced_system_prompt,
        postfix_system_prompt,
        skip_guardrail,
        mask_opt_in,
    })
}

/// `POST /v1/chat/completions` — OpenAI-style, `messages` array, `stream`
/// defaults to `false` per the OpenAI API's own default.
pub fn prepare_openai_chat(raw: Value) -> Result<NormalizedPayload, ProxyError> {
    let mut obj = require_object(raw)?;
    let model = require_model(&obj)?;
    require_key(&obj, "messages")?;
    let stream = obj.get("stream").and_then(Value::as_bool).unwrap_or(false);
    let (language, map_prompt, forced_system_prompt, postfix_system_prompt, skip_guardrail, mask_opt_in) =
        extract_controls(&mut obj);
    Ok(NormalizedPayload {
        endpoint: EndpointKind::OpenAiChat,
        model,
        stream,
        body: Value::Object(obj),
        language,
        map_prompt,
        forced_system_prompt,
        postfix_system_prompt,
        skip_guardrail,
        mask_opt_in,
    })
}

/// `POST /v1/completions` — OpenAI-style legacy completions, `prompt`.
pub fn prepare_openai_completions(raw: Value) -> Result<NormalizedPayload, ProxyError> {
    let mut obj = require_object(raw)?;
    let model = require_model(&obj)?;
    require_key(&obj, "prompt")?;
    let stream = obj.get("stream").and_then(Value::as_bool).unwrap_or(false);
    let (language, map_prompt, forced_system_prompt, postfix_system_prompt, skip_guardrail, mask_opt_in) =
        extract_controls(&mut obj);
    Ok(NormalizedPayload {
        endpoint: EndpointKind::OpenAiCompletions,
        model,
        stream,
        body: Value::Object(obj),
        language,
        map_prompt,
        forced_system_prompt,
        postfix_system_prompt,
        skip_guardrail,
        mask_opt_in,
    })
}

/// Builds a normalized payload for a builtin-utility endpoint
/// (`/api/translate`, `/api/generate_questions`, ...): a single user message
/// plus a fixed system prompt, reusing the same pipeline a real chat request
/// goes through. Builtins never stream.
pub fn prepare_builtin(model: &str, system_prompt: &str, user_content: &str, extra_params: Value) -> NormalizedPayload {
    let mut body = Map::new();
    body.insert("model".to_string(), Value::String(model.to_string()));
    body.insert(
        "messages".to_string(),
        Value::Array(vec![Value::Object({
            let mut m = Map::new();
            m.insert("role".to_string(), Value::String("user".to_string()));
            m.insert("content".to_string(), Value::String(user_content.to_string()));
            m
        })]),
    );
    if let Value::Object(extra) = extra_params {
        for (k, v) in extra {
            body.insert(k, v);
        }
    }
    NormalizedPayload {
        endpoint: EndpointKind::OpenAiChat,
        model: model.to_string(),
        stream: false,
        body: Value::Object(body),
        language: default_language(),
        map_prompt: HashMap::new(),
        forced_system_prompt: Some(system_prompt.to_string()),
        postfix_system_prompt: None,
        skip_guardrail: false,
        mask_opt_in: false,
    }
}

/// Step 5: strips the keys the pipeline uses internally and must never
/// forward upstream.
pub fn strip_internal_keys(body: &mut Value) {
    if let Value::Object(obj) = body {
        obj.retain(|k, _| k != "response_time" && k != "model_name_anonymize" && !k.starts_with("anonymize"));
    }
}

/// Every parameter name an OpenAI-compatible provider (OpenAI, LM Studio,
/// vLLM's OpenAI-compatible server) is known to accept in a chat/completions
/// body. Anything else gets filtered out in step 8 before dispatch.
pub const OPENAI_ACCEPTED_PARAMS: &[&str] = &[
    "model",
    "messages",
    "prompt",
    "stream",
    "stream_options",
    "temperature",
    "top_p",
    "n",
    "stop",
    "max_tokens",
    "presence_penalty",
    "frequency_penalty",
    "logit_bias",
    "user",
    "tools",
    "tool_choice",
    "functions",
    "function_call",
    "response_format",
    "seed",
];

/// Step 8: provider-specific payload adjustment. OpenAI-family providers get
/// filtered to their accepted-parameter whitelist; Ollama providers never
/// see tool/function-calling keys since the family doesn't advertise that
/// capability.
pub fn adjust_for_provider(body: &mut Value, provider_family: Family) {
    let Value::Object(obj) = body else { return };
    match provider_family {
        Family::OpenAi | Family::LmStudio | Family::Vllm => {
            obj.retain(|k, _| OPENAI_ACCEPTED_PARAMS.contains(&k.as_str()));
        }
        Family::Ollama | Family::Anthropic => {
            obj.remove("tools");
            obj.remove("tool_choice");
            obj.remove("functions");
            obj.remove("function_call");
        }
    }
}

/// Step 9: resolves the final system prompt text to prepend to the
/// outbound request, or `None` if nothing applies.
///
/// `system_prompts` is the `SYSTEM_PROMPT_NAME[language]` table loaded from
/// config; `map_prompt` substitutions are plain key→value string
/// replacements applied to the template before the force/postfix overrides.
pub fn resolve_system_prompt(payload: &NormalizedPayload, system_prompts: &HashMap<String, String>) -> Option<String> {
    let mut prompt = system_prompts.get(&payload.language).cloned().unwrap_or_default();
    for (key, value) in &payload.map_prompt {
        prompt = prompt.replace(key.as_str(), value.as_str());
    }
    if let Some(force) = &payload.forced_system_prompt {
        prompt = format!("{force}{prompt}");
    }
    if let Some(postfix) = &payload.postfix_system_prompt {
        prompt.push_str(postfix);
    }
    if prompt.is_empty() { None } else { Some(prompt) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ollama_chat_defaults_stream_to_true() {
        let payload = prepare_ollama_chat(json!({"model": "m1", "messages": []})).unwrap();
        assert!(payload.stream);
        assert_eq!(payload.model, "m1");
    }

    #[test]
    fn openai_chat_defaults_stream_to_false() {
        let payload = prepare_openai_chat(json!({"model": "m1", "messages": []})).unwrap();
        assert!(!payload.stream);
    }

    #[test]
    fn missing_messages_is_rejected() {
        let err = prepare_openai_chat(json!({"model": "m1"})).unwrap_err();
        assert!(matches!(err, ProxyError::MissingParam("messages")));
    }

    #[test]
    fn extracts_router_only_controls() {
        let payload = prepare_openai_chat(json!({
            "model": "m1",
            "messages": [],
            "map_prompt": {"{name}": "Ada"},
            "prompt_str_force": "Be terse. ",
            "prompt_str_postfix": " Stay on topic.",
            "language": "en",
        }))
        .unwrap();
        assert_eq!(payload.language, "en");
        assert_eq!(payload.map_prompt.get("{name}").unwrap(), "Ada");
        assert_eq!(payload.forced_system_prompt.as_deref(), Some("Be terse. "));
        assert!(!payload.body.as_object().unwrap().contains_key("map_prompt"));
    }

    #[test]
    fn strip_internal_keys_removes_anonymize_family() {
        let mut body = json!({
            "messages": [],
            "response_time": 12,
            "anonymize_entities": true,
            "model_name_anonymize": "x",
            "keep_me": 1,
        });
        strip_internal_keys(&mut body);
        let obj = body.as_object().unwrap();
        assert!(!obj.contains_key("response_time"));
        assert!(!obj.contains_key("anonymize_entities"));
        assert!(!obj.contains_key("model_name_anonymize"));
        assert!(obj.contains_key("keep_me"));
    }

    #[test]
    fn adjust_for_provider_strips_tools_for_ollama() {
        let mut body = json!({"messages": [], "tools": [1], "tool_choice": "auto"});
        adjust_for_provider(&mut body, Family::Ollama);
        let obj = body.as_object().unwrap();
        assert!(!obj.contains_key("tools"));
        assert!(!obj.contains_key("tool_choice"));
    }

    #[test]
    fn adjust_for_provider_whitelists_openai_params() {
        let mut body = json!({"messages": [], "made_up_param": 1, "temperature": 0.5});
        adjust_for_provider(&mut body, Family::OpenAi);
        let obj = body.as_object().unwrap();
        assert!(!obj.contains_key("made_up_param"));
        assert!(obj.contains_key("temperature"));
    }

    #[test]
    fn resolve_system_prompt_applies_substitution_then_force_and_postfix() {
        let mut system_prompts = HashMap::new();
        system_prompts.insert("pl".to_string(), "Hello {name}.".to_string());
        let payload = prepare_openai_chat(json!({
            "model": "m1",
            "messages": [],
            "map_prompt": {"{name}": "Ada"},
            "prompt_str_force": "PREFIX ",
            "prompt_str_postfix": " SUFFIX",
        }))
        .unwrap();
        let resolved = resolve_system_prompt(&payload, &system_prompts).unwrap();
        assert_eq!(resolved, "PREFIX Hello Ada. SUFFIX");
    }

    #[test]
    fn resolve_system_prompt_is_none_when_nothing_applies() {
        let payload = prepare_openai_chat(json!({"model": "m1", "messages": []})).unwrap();
        assert!(resolve_system_prompt(&payload, &HashMap::new()).is_none());
    }
}
