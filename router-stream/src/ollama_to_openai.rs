use bytes::Bytes;
use futures_util::StreamExt;
use serde_json::Value;

use crate::{ReleaseGuard, TranscodedStream, UpstreamStream};

fn openai_chunk(model: &str, content: &str) -> Bytes {
    let id = format!("chatcmpl-{}", uuid::Uuid::new_v4());
    let created = chrono::Utc::now().timestamp();
    let payload = serde_json::json!({
        "id": id,
        "object": "chat.completion.chunk",
        "created": created,
        "model": model,
        "choices": [{
            "index": 0,
            "delta": { "content": content },
            "finish_reason": null,
        }],
    });
    Bytes::from(format!("data: {}\n\n", payload))
}

fn openai_final_chunk(model: &str) -> Bytes {
    let id = format!("chatcmpl-{}", uuid::Uuid::new_v4());
    let created = chrono::Utc::now().timestamp();
    let payload = serde_json::json!({
        "id": id,
        "object": "chat.completion.chunk",
        "created": created,
        "model": model,
        "choices": [{
            "index": 0,
            "delta": {},
            "finish_reason": "stop",
        }],
    });
    Bytes::from(format!("data: {}\n\n", payload))
}

/// Parses upstream Ollama NDJSON lines and emits one SSE chunk event per
/// non-empty `message.content`, followed by a terminal `finish_reason:
/// "stop"` chunk and `data: [DONE]` once `done:true` is seen. Lines that
/// fail to parse as JSON are forwarded unchanged, matching the lenient
/// fallback in the original line parser.
pub fn ollama_to_openai(model: String, upstream: UpstreamStream, guard: ReleaseGuard) -> TranscodedStream {
    Box::pin(async_stream::stream! {
        let _guard = guard;
        futures_util::pin_mut!(upstream);
        let mut buffer = String::new();
        let mut sent_done = false;

        while let Some(item) = upstream.next().await {
            let bytes = match item {
                Ok(b) => b,
                Err(err) => {
                    if !sent_done {
                        yield crate::passthrough::sse_error_event(&err.to_string());
                        sent_done = true;
                    }
                    break;
                }
            };
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(pos) = buffer.find('\n') {
                let line: String = buffer.drain(..pos + 1).collect();
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match serde_json::from_str::<Value>(line) {
                    Ok(value) => {
                        let done = value.get("done").and_then(Value::as_bool).unwrap_or(false);
                        let content = value
                            .get("message")
                            .and_then(|m| m.get("content"))
                            .and_then(Value::as_str)
                            .unwrap_or("");
                        if !content.is_empty() {
                            yield openai_chunk(&model, content);
                        }
                        if done && !sent_done {
                            yield openai_final_chunk(&model);
                            yield Bytes::from_static(b"data: [DONE]\n\n");
                            sent_done = true;
                        }
                    }
                    Err(_) => {
                        yield Bytes::from(format!("{line}\n"));
                    }
                }
            }
        }

        if !sent_done {
            yield openai_final_chunk(&model);
            yield Bytes::from_static(b"data: [DONE]\n\n");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn ndjson(json: &str) -> Bytes {
        Bytes::from(format!("{json}\n"))
    }

    #[tokio::test]
    async fn non_terminal_lines_become_one_chunk_each() {
        let frames = vec![
            Ok(ndjson(r#"{"message":{"content":"hel"},"done":false}"#)),
            Ok(ndjson(r#"{"message":{"content":"lo"},"done":false}"#)),
            Ok(ndjson(r#"{"message":{"content":""},"done":true}"#)),
        ];
        let upstream: UpstreamStream = Box::pin(stream::iter(frames));
        let out: Vec<Bytes> = ollama_to_openai("m1".into(), upstream, ReleaseGuard::noop())
            .collect()
            .await;

        assert_eq!(out.len(), 4);
        assert!(String::from_utf8_lossy(&out[0]).contains("\"content\":\"hel\""));
        assert!(String::from_utf8_lossy(&out[1]).contains("\"content\":\"lo\""));
        assert!(String::from_utf8_lossy(&out[2]).contains("\"finish_reason\":\"stop\""));
        assert_eq!(&out[3][..], b"data: [DONE]\n\n");
    }

    #[tokio::test]
    async fn unparseable_line_is_forwarded_unchanged() {
        let frames = vec![Ok(ndjson("not json")), Ok(ndjson(r#"{"message":{"content":""},"done":true}"#))];
        let upstream: UpstreamStream = Box::pin(stream::iter(frames));
        let out: Vec<Bytes> = ollama_to_openai("m1".into(), upstream, ReleaseGuard::noop())
            .collect()
            .await;
        assert_eq!(&out[0][..], b"not json\n");
    }
}
