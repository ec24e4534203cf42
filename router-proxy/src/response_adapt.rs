//! Step 11's "optionally post-process into the endpoint's canonical shape":
//! the non-streaming counterpart of `router-stream`'s transcoders. When the
//! inbound endpoint's family matches the provider's, the raw upstream JSON
//! is forwarded unchanged; otherwise it is reshaped into the family the
//! client asked for.

use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;

use router_protocol::Family;

/// Reshapes a non-streaming upstream response into the shape the inbound
/// endpoint's family expects. A no-op when the families already match.
pub fn adapt_blocking_response(endpoint_family: Family, provider_family: Family, model: &str, raw: Value) -> Value {
    let endpoint_ollama = matches!(endpoint_family, Family::Ollama);
    let provider_ollama = matches!(provider_family, Family::Ollama);
    match (endpoint_ollama, provider_ollama) {
        (true, true) | (false, false) => raw,
        (true, false) => ollama_shape_from_openai(model, &raw),
        (false, true) => openai_shape_from_ollama(model, &raw),
    }
}

fn ollama_shape_from_openai(model: &str, raw: &Value) -> Value {
    let content = raw
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let prompt_tokens = raw.get("usage").and_then(|u| u.get("prompt_tokens")).and_then(Value::as_u64);
    let completion_tokens = raw.get("usage").and_then(|u| u.get("completion_tokens")).and_then(Value::as_u64);

    json!({
        "model": model,
        "created_at": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        "message": { "role": "assistant", "content": content },
        "done": true,
        "prompt_eval_count": prompt_tokens.unwrap_or(0),
        "eval_count": completion_tokens.unwrap_or(0),
    })
}

fn openai_shape_from_ollama(model: &str, raw: &Value) -> Value {
    let content = raw
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let prompt_eval_count = raw.get("prompt_eval_count").and_then(Value::as_u64).unwrap_or(0);
    let eval_count = raw.get("eval_count").and_then(Value::as_u64).unwrap_or(0);

    json!({
        "id": format!("chatcmpl-{}", Uuid::new_v4()),
        "object": "chat.completion",
        "created": Utc::now().timestamp(),
        "model": model,
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop",
        }],
        "usage": {
            "prompt_tokens": prompt_eval_count,
            "completion_tokens": eval_count,
            "total_tokens": prompt_eval_count + eval_count,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_families_pass_through_unchanged() {
        let raw = json!({"anything": "goes"});
        let out = adapt_blocking_response(Family::OpenAi, Family::Vllm, "m1", raw.clone());
        assert_eq!(out, raw);
    }

    #[test]
    fn ollama_endpoint_against_openai_provider_reshapes() {
        let raw = json!({
            "choices": [{"message": {"role": "assistant", "content": "hi"}}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 1},
        });
        let out = adapt_blocking_response(Family::Ollama, Family::OpenAi, "m1", raw);
        assert_eq!(out["message"]["content"], "hi");
        assert_eq!(out["done"], true);
        assert_eq!(out["prompt_eval_count"], 3);
        assert_eq!(out["eval_count"], 1);
    }

    #[test]
    fn openai_endpoint_against_ollama_provider_reshapes() {
        let raw = json!({
            "message": {"role": "assistant", "content": "hi"},
            "done": true,
            "prompt_eval_count": 3,
            "eval_count": 1,
        });
        let out = adapt_blocking_response(Family::OpenAi, Family::Ollama, "m1", raw);
        assert_eq!(out["choices"][0]["message"]["content"], "hi");
        assert_eq!(out["usage"]["total_tokens"], 4);
    }
}
