//! Proxy Pipeline: orchestrates guardrail checks, PII masking, provider
//! selection, outbound dispatch (blocking or streamed), retry-on-transient-
//! failure, and lock release for every inbound chat/completions request.
//! Every other crate in this workspace is a dependency of this one; this is
//! the seam `api`'s thin axum handlers call into.

mod error;
mod metrics;
mod payload;
mod pipeline;
mod response_adapt;

pub use error::ProxyError;
pub use metrics::ProxyMetrics;
pub use payload::{
    adjust_for_provider, prepare_builtin, prepare_ollama_chat, prepare_ollama_generate, prepare_openai_chat,
    prepare_openai_completions, resolve_system_prompt, strip_internal_keys, EndpointKind, NormalizedPayload,
    OPENAI_ACCEPTED_PARAMS,
};
pub use pipeline::{PipelineOutcome, ProxyPipeline};
pub use response_adapt::adapt_blocking_response;

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use router_config::ModelConfig;
    use router_guardrail::{GuardrailError, GuardrailPlugin, GuardrailVerdict, NoopGuardrail};
    use router_handler::ModelHandler;
    use router_health::HealthMonitor;
    use router_http::HttpExecutor;
    use router_lb::{StrategyDeps, StrategyFacade};
    use router_store::{CoordinationStore, InMemoryStore};
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config(host: &str) -> Arc<ModelConfig> {
        Arc::new(
            ModelConfig::from_str(&format!(
                r#"{{
                    "chat": {{
                        "m1": {{ "providers": [
                            {{ "id": "p1", "api_host": "{host}", "api_type": "openai" }}
                        ]}}
                    }},
                    "active_models": {{ "chat": ["m1"] }}
                }}"#
            ))
            .unwrap(),
        )
    }

    fn pipeline(cfg: Arc<ModelConfig>, guardrail: Option<Arc<dyn GuardrailPlugin>>) -> ProxyPipeline {
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
        let health = Arc::new(HealthMonitor::new(store.clone(), 30));
        let deps = StrategyDeps {
            store: store.clone(),
            health,
            check_interval: Duration::from_millis(10),
            acquire_timeout: Duration::from_secs(1),
            dynamic_weighted_history_size: 100,
        };
        let facade = StrategyFacade::new("balanced", deps).unwrap();
        let handler = Arc::new(ModelHandler::new(cfg, facade));
        let http = Arc::new(HttpExecutor::new(Duration::from_secs(5)));
        ProxyPipeline::new(handler, http, store, guardrail, None, Vec::new(), HashMap::new(), false)
    }

    struct AlwaysUnsafe;

    #[async_trait::async_trait]
    impl GuardrailPlugin for AlwaysUnsafe {
        async fn check(&self, _payload: &serde_json::Value) -> Result<GuardrailVerdict, GuardrailError> {
            Ok(GuardrailVerdict::unsafe_with("Not safe content!"))
        }
    }

    #[tokio::test]
    async fn blocking_chat_round_trips_through_a_mocked_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "hi there"}}],
                "usage": {"prompt_tokens": 2, "completion_tokens": 2},
            })))
            .mount(&server)
            .await;

        let pipeline = pipeline(config(&server.uri()), Some(Arc::new(NoopGuardrail)));
        let payload = prepare_openai_chat(json!({
            "model": "m1",
            "messages": [{"role": "user", "content": "hi"}],
        }))
        .unwrap();

        let outcome = pipeline.handle(payload).await.unwrap();
        match outcome {
            PipelineOutcome::Blocking { body } => {
                assert_eq!(body["choices"][0]["message"]["content"], "hi there");
            }
            PipelineOutcome::Streaming { .. } => panic!("expected a blocking outcome"),
        }
    }

    #[tokio::test]
    async fn guardrail_block_on_non_streaming_request_returns_structured_error() {
        let pipeline = pipeline(config("http://unused"), Some(Arc::new(AlwaysUnsafe)));
        let payload = prepare_openai_chat(json!({
            "model": "m1",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": false,
        }))
        .unwrap();

        let err = pipeline.handle(payload).await.unwrap_err();
        assert!(matches!(err, ProxyError::GuardrailBlocked(_)));
        assert_eq!(pipeline.metrics().snapshot().0, 1);
    }

    #[tokio::test]
    async fn guardrail_block_on_streaming_request_yields_forced_chunk_stream() {
        use futures_util::StreamExt;

        let pipeline = pipeline(config("http://unused"), Some(Arc::new(AlwaysUnsafe)));
        let payload = prepare_openai_chat(json!({
            "model": "m1",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": true,
        }))
        .unwrap();

        let outcome = pipeline.handle(payload).await.unwrap();
        match outcome {
            PipelineOutcome::Streaming { content_type, body } => {
                assert_eq!(content_type, "text/event-stream");
                let chunks: Vec<bytes::Bytes> = body.collect().await;
                let joined = chunks.iter().map(|c| String::from_utf8_lossy(c)).collect::<String>();
                assert!(joined.contains("Content blocked by guardrail. Reason: Not safe content!"));
                assert!(joined.ends_with("data: [DONE]\n\n"));
            }
            PipelineOutcome::Blocking { .. } => panic!("expected a streaming outcome"),
        }
    }

    #[tokio::test]
    async fn retries_on_503_then_succeeds_on_second_provider() {
        let bad = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(503)).mount(&bad).await;
        let good = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "ok"}}],
            })))
            .mount(&good)
            .await;

        let cfg = Arc::new(
            ModelConfig::from_str(&format!(
                r#"{{
                    "chat": {{
                        "m1": {{ "providers": [
                            {{ "id": "p1", "api_host": "{}", "api_type": "openai", "order": 0 }},
                            {{ "id": "p2", "api_host": "{}", "api_type": "openai", "order": 1 }}
                        ]}}
                    }},
                    "active_models": {{ "chat": ["m1"] }}
                }}"#,
                bad.uri(),
                good.uri()
            ))
            .unwrap(),
        );
        let pipeline = pipeline(cfg, Some(Arc::new(NoopGuardrail)));
        let payload = prepare_openai_chat(json!({
            "model": "m1",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": false,
        }))
        .unwrap();

        let outcome = pipeline.handle(payload).await.unwrap();
        match outcome {
            PipelineOutcome::Blocking { body } => assert_eq!(body["choices"][0]["message"]["content"], "ok"),
            PipelineOutcome::Streaming { .. } => panic!("expected a blocking outcome"),
        }
    }
}
