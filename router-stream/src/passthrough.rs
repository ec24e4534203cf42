use bytes::Bytes;
use futures_util::StreamExt;

use crate::{ReleaseGuard, TranscodedStream, UpstreamStream};

/// Forwards upstream bytes unchanged. On a transport error mid-stream,
/// emits a single terminal SSE error event and stops — the client still
/// sees a well-formed stream close rather than a truncated connection.
pub fn openai_passthrough(upstream: UpstreamStream, guard: ReleaseGuard) -> TranscodedStream {
    Box::pin(async_stream::stream! {
        let _guard = guard;
        futures_util::pin_mut!(upstream);
        while let Some(item) = upstream.next().await {
            match item {
                Ok(bytes) => yield bytes,
                Err(err) => {
                    yield sse_error_event(&err.to_string());
                    break;
                }
            }
        }
    })
}

/// Forwards upstream bytes unchanged. On a transport error mid-stream,
/// emits a single terminal NDJSON error line and stops.
pub fn ollama_passthrough(upstream: UpstreamStream, guard: ReleaseGuard) -> TranscodedStream {
    Box::pin(async_stream::stream! {
        let _guard = guard;
        futures_util::pin_mut!(upstream);
        while let Some(item) = upstream.next().await {
            match item {
                Ok(bytes) => yield bytes,
                Err(err) => {
                    yield ndjson_error_line(&err.to_string());
                    break;
                }
            }
        }
    })
}

/// Builds a synthetic single-content-chunk stream with no upstream call —
/// used when the pipeline short-circuits (a guardrail rejection that the
/// client still expects a stream response for).
pub fn force_chunk(mode: crate::StreamMode, model: &str, text: &str, guard: ReleaseGuard) -> TranscodedStream {
    let model = model.to_string();
    let text = text.to_string();
    Box::pin(async_stream::stream! {
        let _guard = guard;
        match mode {
            crate::StreamMode::OpenaiPassthrough | crate::StreamMode::OllamaToOpenai => {
                yield openai_chunk_event(&model, &text);
                yield Bytes::from_static(b"data: [DONE]\n\n");
            }
            crate::StreamMode::OllamaPassthrough | crate::StreamMode::OpenaiToOllama => {
                yield crate::openai_to_ollama::ollama_content_line(&model, &text);
                yield crate::openai_to_ollama::ollama_terminal_line(&model, None);
            }
        }
    })
}

pub(crate) fn sse_error_event(message: &str) -> Bytes {
    let payload = serde_json::json!({ "error": message });
    Bytes::from(format!("data: {}\n\n", payload))
}

pub(crate) fn ndjson_error_line(message: &str) -> Bytes {
    let payload = serde_json::json!({ "error": message });
    Bytes::from(format!("{}\n", payload))
}

fn openai_chunk_event(model: &str, content: &str) -> Bytes {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StreamMode;

    #[tokio::test]
    async fn forced_openai_chunk_ends_with_done_marker() {
        let stream = force_chunk(StreamMode::OpenaiPassthrough, "m1", "blocked", ReleaseGuard::noop());
        let items: Vec<Bytes> = futures_util::StreamExt::collect::<Vec<_>>(stream).await;
        assert_eq!(items.len(), 2);
        assert!(String::from_utf8_lossy(&items[0]).contains("\"content\":\"blocked\""));
        assert_eq!(&items[1][..], b"data: [DONE]\n\n");
    }

    #[tokio::test]
    async fn forced_ollama_chunk_ends_with_done_true() {
        let stream = force_chunk(StreamMode::OllamaPassthrough, "m1", "blocked", ReleaseGuard::noop());
        let items: Vec<Bytes> = futures_util::StreamExt::collect::<Vec<_>>(stream).await;
        assert_eq!(items.len(), 2);
        assert!(String::from_utf8_lossy(&items[1]).contains("\"done\":true"));
    }
}
