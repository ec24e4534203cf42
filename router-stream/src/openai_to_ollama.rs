use bytes::Bytes;
use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;

use crate::{ReleaseGuard, TranscodedStream, UpstreamStream};

#[derive(Serialize)]
struct OllamaMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct OllamaChunk {
    model: String,
    created_at: String,
    done: bool,
    message: OllamaMessage,
    eval_count: u64,
    prompt_eval_count: u64,
}

fn now_rfc3339z() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub(crate) fn ollama_content_line(model: &str, content: &str) -> Bytes {
    let chunk = OllamaChunk {
        model: model.to_string(),
        created_at: now_rfc3339z(),
        done: false,
        message: OllamaMessage {
            role: "assistant",
            content: content.to_string(),
        },
        eval_count: 0,
        prompt_eval_count: 0,
    };
    Bytes::from(format!("{}\n", serde_json::to_string(&chunk).expect("chunk serializes")))
}

pub(crate) fn ollama_terminal_line(model: &str, usage: Option<(u64, u64)>) -> Bytes {
    let (prompt_eval_count, eval_count) = usage.unwrap_or((0, 0));
    let chunk = OllamaChunk {
        model: model.to_string(),
        created_at: now_rfc3339z(),
        done: true,
        message: OllamaMessage {
            role: "assistant",
            content: String::new(),
        },
        eval_count,
        prompt_eval_count,
    };
    Bytes::from(format!("{}\n", serde_json::to_string(&chunk).expect("chunk serializes")))
}

fn extract_usage(usage: &Value) -> Option<(u64, u64)> {
    let prompt = usage.get("prompt_tokens")?.as_u64()?;
    let completion = usage.get("completion_tokens")?.as_u64()?;
    Some((prompt, completion))
}

fn delta_content(event: &Value) -> Option<&str> {
    let choice = event.get("choices")?.get(0)?;
    choice
        .get("delta")
        .and_then(|d| d.get("content"))
        .or_else(|| choice.get("text"))
        .and_then(Value::as_str)
}

fn finish_reason_present(event: &Value) -> bool {
    event
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("finish_reason"))
        .map(|f| !f.is_null())
        .unwrap_or(false)
}

/// Parses upstream OpenAI-style SSE frames (`data: <json>\n\n`) and emits
/// one Ollama NDJSON line per non-empty delta, ported from
/// `_parse_ollama_stream`'s SSE branch. Exactly one terminal `done:true`
/// line is emitted, regardless of how many `[DONE]`/`finish_reason` signals
/// arrive.
pub fn openai_to_ollama(model: String, upstream: UpstreamStream, guard: ReleaseGuard) -> TranscodedStream {
    Box::pin(async_stream::stream! {
        let _guard = guard;
        futures_util::pin_mut!(upstream);
        let mut buffer = String::new();
        let mut sent_done = false;
        let mut usage: Option<(u64, u64)> = None;

        while let Some(item) = upstream.next().await {
            let bytes = match item {
                Ok(b) => b,
                Err(err) => {
                    if !sent_done {
                        yield crate::passthrough::ndjson_error_line(&err.to_string());
                        sent_done = true;
                    }
                    break;
                }
            };
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(pos) = buffer.find("\n\n") {
                let frame: String = buffer.drain(..pos + 2).collect();
                for line in frame.lines() {
                    let Some(data) = line.trim().strip_prefix("data:").map(str::trim) else {
                        continue;
                    };
                    if data == "[DONE]" {
                        if !sent_done {
                            yield ollama_terminal_line(&model, usage);
                            sent_done = true;
                        }
                        continue;
                    }
                    let Ok(event) = serde_json::from_str::<Value>(data) else {
                        continue;
                    };
                    if let Some(u) = event.get("usage").and_then(extract_usage) {
                        usage = Some(u);
                    }
                    if let Some(content) = delta_content(&event) {
                        if !content.is_empty() {
                            yield ollama_content_line(&model, content);
                        }
                    }
                    if finish_reason_present(&event) && !sent_done {
                        yield ollama_terminal_line(&model, usage);
                        sent_done = true;
                    }
                }
            }
        }

        if !sent_done {
            yield ollama_terminal_line(&model, usage);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn sse_event(json: &str) -> Bytes {
        Bytes::from(format!("data: {json}\n\n"))
    }

    #[tokio::test]
    async fn emits_one_line_per_delta_and_exactly_one_terminal() {
        let frames = vec![
            Ok(sse_event(r#"{"choices":[{"delta":{"content":"hel"}}]}"#)),
            Ok(sse_event(r#"{"choices":[{"delta":{"content":"lo"}}]}"#)),
            Ok(sse_event(r#"{"choices":[{"delta":{},"finish_reason":"stop"}],"usage":{"prompt_tokens":3,"completion_tokens":2}}"#)),
            Ok(Bytes::from_static(b"data: [DONE]\n\n")),
        ];
        let upstream: UpstreamStream = Box::pin(stream::iter(frames));
        let out: Vec<Bytes> = openai_to_ollama("m1".into(), upstream, ReleaseGuard::noop())
            .collect()
            .await;

        assert_eq!(out.len(), 3);
        let lines: Vec<Value> = out.iter().map(|b| serde_json::from_slice(b).unwrap()).collect();
        assert_eq!(lines[0]["message"]["content"], "hel");
        assert_eq!(lines[1]["message"]["content"], "lo");
        assert_eq!(lines[2]["done"], true);
        assert_eq!(lines[2]["prompt_eval_count"], 3);
        assert_eq!(lines[2]["eval_count"], 2);
    }

    #[tokio::test]
    async fn no_finish_reason_still_emits_a_terminal_line() {
        let frames = vec![Ok(sse_event(r#"{"choices":[{"delta":{"content":"hi"}}]}"#))];
        let upstream: UpstreamStream = Box::pin(stream::iter(frames));
        let out: Vec<Bytes> = openai_to_ollama("m1".into(), upstream, ReleaseGuard::noop())
            .collect()
            .await;
        let lines: Vec<Value> = out.iter().map(|b| serde_json::from_slice(b).unwrap()).collect();
        assert_eq!(lines.last().unwrap()["done"], true);
    }
}
