use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde_json::Value;
use tracing::{info, instrument, warn};

use router_config::Provider;
use router_guardrail::{GuardrailPlugin, MaskerPlugin, UtilsPlugin};
use router_handler::ModelHandler;
use router_http::HttpExecutor;
use router_keepalive::{parse_keep_alive, record_usage};
use router_lb::AcquireOptions;
use router_protocol::{Descriptor, Family};
use router_store::CoordinationStore;
use router_stream::{BoxError, ReleaseGuard, StreamMode, TranscodedStream, UpstreamStream};

use crate::error::ProxyError;
use crate::metrics::ProxyMetrics;
use crate::payload::{adjust_for_provider, resolve_system_prompt, strip_internal_keys, NormalizedPayload};
use crate::response_adapt::adapt_blocking_response;

/// Statuses the retry policy treats as transient — worth a different
/// provider rather than failing the whole request. `400` is intentionally
/// included as tolerance for provider-side request rejections that may
/// succeed on a different provider.
const RETRIABLE_STATUSES: &[u16] = &[400, 404, 429, 500, 503, 504];

/// The retry loop's hard cap. The 11th attempt is never made.
const MAX_ATTEMPTS: u32 = 10;

const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// What a finished pipeline run produces: either a complete response body
/// ready to serialize, or a live stream to forward to the client as bytes
/// arrive.
pub enum PipelineOutcome {
    Blocking { body: Value },
    Streaming { content_type: &'static str, body: TranscodedStream },
}

fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the unix epoch")
        .as_secs()
}

fn content_type_for(mode: StreamMode) -> &'static str {
    match mode {
        StreamMode::OpenaiPassthrough | StreamMode::OllamaToOpenai => "text/event-stream",
        StreamMode::OllamaPassthrough | StreamMode::OpenaiToOllama => "application/x-ndjson",
    }
}

fn to_upstream_stream(
    stream: impl Stream<Item = Result<Bytes, router_http::HttpError>> + Send + 'static,
) -> UpstreamStream {
    Box::pin(stream.map(|item| item.map_err(|e| Box::new(e) as BoxError)))
}

/// Outcome of one provider attempt, distinguishing "worth retrying with a
/// different provider" from "surface this to the client."
enum AttemptError {
    Retriable(ProxyError),
    Fatal(ProxyError),
}

/// Orchestrates every inbound request end to end: guardrail, masking,
/// provider selection, dispatch, retry, release.
pub struct ProxyPipeline {
    handler: Arc<ModelHandler>,
    http: Arc<HttpExecutor>,
    store: Arc<dyn CoordinationStore>,
    guardrail: Option<Arc<dyn GuardrailPlugin>>,
    masker: Option<Arc<dyn MaskerPlugin>>,
    utils: Vec<Arc<dyn UtilsPlugin>>,
    system_prompts: HashMap<String, String>,
    masking_enabled: bool,
    metrics: ProxyMetrics,
}

impl ProxyPipeline {
    pub fn new(
        handler: Arc<ModelHandler>,
        http: Arc<HttpExecutor>,
        store: Arc<dyn CoordinationStore>,
        guardrail: Option<Arc<dyn GuardrailPlugin>>,
        masker: Option<Arc<dyn MaskerPlugin>>,
        utils: Vec<Arc<dyn UtilsPlugin>>,
        system_prompts: HashMap<String, String>,
        masking_enabled: bool,
    ) -> Self {
        Self {
            handler,
            http,
            store,
            guardrail,
            masker,
            utils,
            system_prompts,
            masking_enabled,
            metrics: ProxyMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &ProxyMetrics {
        &self.metrics
    }

    /// Runs the full pipeline for one already-normalized inbound request.
    #[instrument(skip_all, fields(model = %payload.model, stream = payload.stream))]
    pub async fn handle(&self, mut payload: NormalizedPayload) -> Result<PipelineOutcome, ProxyError> {
        // Step 2: utils plugins may mutate the payload body.
        for plugin in &self.utils {
            plugin.run(&mut payload.body).await?;
        }

        // Step 3: guardrail.
        if let Some(guardrail) = self.guardrail.as_ref().filter(|_| !payload.skip_guardrail) {
            let verdict = guardrail.check(&payload.body).await?;
            if !verdict.safe {
                self.metrics.record_guardrail_incident();
                let reason = verdict.reason.unwrap_or_else(|| "Not safe content!".to_string());
                warn!(model = %payload.model, reason, "guardrail rejected request");
                if payload.stream {
                    return self.blocked_stream(&payload, &reason).await;
                }
                return Err(ProxyError::GuardrailBlocked(reason));
            }
        }

        // Step 4: masking.
        if (self.masking_enabled || payload.mask_opt_in) && self.masker.is_some() {
            let masker = self.masker.as_ref().unwrap();
            if masker.mask(&mut payload.body) {
                self.metrics.record_masker_incident();
            }
        }

        // Step 5: strip internal keys.
        strip_internal_keys(&mut payload.body);

        // Steps 6-13: direct dispatch with retry. (Direct-return endpoints
        // like `/models`/`/version` never reach this pipeline — the `api`
        // crate answers those without touching `ProxyPipeline`.)
        self.dispatch_with_retry(payload).await
    }

    async fn blocked_stream(&self, payload: &NormalizedPayload, reason: &str) -> Result<PipelineOutcome, ProxyError> {
        let options = AcquireOptions::default();
        let acquired = self.handler.acquire(&payload.model, &options, true).await?;
        self.handler.release(&payload.model, &acquired, &options, true).await?;

        let provider_family = Family::from(acquired.provider.api_type);
        let endpoint_family = payload.endpoint.family();
        let mode = StreamMode::resolve(endpoint_family, provider_family);
        let message = format!("Content blocked by guardrail. Reason: {reason}");
        let body = router_stream::force_chunk(mode, &payload.model, &message, ReleaseGuard::noop());
        Ok(PipelineOutcome::Streaming {
            content_type: content_type_for(mode),
            body,
        })
    }

    async fn dispatch_with_retry(&self, payload: NormalizedPayload) -> Result<PipelineOutcome, ProxyError> {
        let mut options = AcquireOptions::default();
        let mut last_err: Option<ProxyError> = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                options.random_choice = true;
                tokio::time::sleep(RETRY_BACKOFF).await;
            }

            match self.attempt_once(&payload, &options).await {
                Ok(outcome) => return Ok(outcome),
                Err(AttemptError::Retriable(err)) => {
                    warn!(attempt, model = %payload.model, error = %err, "retriable upstream failure");
                    last_err = Some(err);
                }
                Err(AttemptError::Fatal(err)) => return Err(err),
            }
        }

        Err(ProxyError::RetriesExhausted {
            attempts: MAX_ATTEMPTS,
            last: last_err.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    async fn attempt_once(&self, payload: &NormalizedPayload, options: &AcquireOptions) -> Result<PipelineOutcome, AttemptError> {
        // Step 7: acquire.
        let acquired = self
            .handler
            .acquire(&payload.model, options, false)
            .await
            .map_err(|e| AttemptError::Fatal(ProxyError::Handler(e)))?;
        let provider = acquired.provider.clone();

        self.record_keep_alive_usage(&payload.model, &provider).await;

        // Step 8: provider-specific payload adjustment.
        let mut body = payload.body.clone();
        let provider_family = Family::from(provider.api_type);
        adjust_for_provider(&mut body, provider_family);
        if let Value::Object(ref mut obj) = body {
            obj.insert(
                "model".to_string(),
                Value::String(provider.remote_model_name(&payload.model).to_string()),
            );
        }

        // Step 9: system prompt.
        let system_prompt = resolve_system_prompt(payload, &self.system_prompts);

        // Step 10: resolve endpoint URL.
        let descriptor = Descriptor::for_family(provider_family);
        let path = if payload.endpoint.is_chat() {
            descriptor.chat_path
        } else {
            descriptor.completions_path
        };
        let url = format!("{}{}", provider.api_host.trim_end_matches('/'), path);

        // Step 11: dispatch.
        let options_owned = options.clone();
        if payload.stream {
            self.dispatch_streaming(payload, &provider, &url, body, system_prompt, acquired, options_owned)
                .await
        } else {
            self.dispatch_blocking(payload, &provider, &url, body, system_prompt, acquired, options_owned)
                .await
        }
    }

    async fn record_keep_alive_usage(&self, model: &str, provider: &Provider) {
        let keep_alive_secs = provider.keep_alive.as_deref().and_then(parse_keep_alive).unwrap_or(0);
        if let Err(err) = record_usage(self.store.as_ref(), model, provider.host(), keep_alive_secs, now_epoch()).await {
            warn!(model, host = provider.host(), error = %err, "failed to record keep-alive usage");
        }
    }

    async fn release(&self, model: &str, acquired: &router_lb::AcquiredProvider, options: &AcquireOptions) {
        if let Err(err) = self.handler.release(model, acquired, options, false).await {
            warn!(model, error = %err, "failed to release provider lock");
        }
    }

    fn classify_http_error(err: router_http::HttpError) -> (bool, ProxyError) {
        let retriable = match &err {
            router_http::HttpError::HttpStatus { status, .. } => RETRIABLE_STATUSES.contains(&status.as_u16()),
            _ => false,
        };
        (retriable, ProxyError::Upstream(err))
    }

    async fn dispatch_blocking(
        &self,
        payload: &NormalizedPayload,
        provider: &Provider,
        url: &str,
        body: Value,
        system_prompt: Option<String>,
        acquired: router_lb::AcquiredProvider,
        options: AcquireOptions,
    ) -> Result<PipelineOutcome, AttemptError> {
        let result = self.http.dispatch_blocking(url, provider, body, system_prompt.as_deref()).await;
        self.release(&payload.model, &acquired, &options).await;

        match result {
            Ok(raw) => {
                let endpoint_family = payload.endpoint.family();
                let provider_family = Family::from(provider.api_type);
                let shaped = adapt_blocking_response(endpoint_family, provider_family, &payload.model, raw);
                Ok(PipelineOutcome::Blocking { body: shaped })
            }
            Err(err) => {
                let (retriable, proxy_err) = Self::classify_http_error(err);
                if retriable {
                    Err(AttemptError::Retriable(proxy_err))
                } else {
                    Err(AttemptError::Fatal(proxy_err))
                }
            }
        }
    }

    async fn dispatch_streaming(
        &self,
        payload: &NormalizedPayload,
        provider: &Provider,
        url: &str,
        mut body: Value,
        system_prompt: Option<String>,
        acquired: router_lb::AcquiredProvider,
        options: AcquireOptions,
    ) -> Result<PipelineOutcome, AttemptError> {
        if let Some(prompt) = system_prompt.as_deref() {
            router_http::prepend_system_prompt(&mut body, prompt);
        }

        let provider_family = Family::from(provider.api_type);
        let accept = if matches!(provider_family, Family::Ollama) {
            None
        } else {
            Some("text/event-stream")
        };

        let upstream = self.http.dispatch_stream(url, provider, body, accept).await;
        let upstream = match upstream {
            Ok(stream) => stream,
            Err(err) => {
                self.release(&payload.model, &acquired, &options).await;
                let (retriable, proxy_err) = Self::classify_http_error(err);
                return if retriable {
                    Err(AttemptError::Retriable(proxy_err))
                } else {
                    Err(AttemptError::Fatal(proxy_err))
                };
            }
        };

        let endpoint_family = payload.endpoint.family();
        let mode = StreamMode::resolve(endpoint_family, provider_family);
        let model = payload.model.clone();
        let handler = self.handler.clone();
        let guard = ReleaseGuard::new(move || {
            let handler = handler.clone();
            let model = model.clone();
            let acquired = acquired.clone();
            let options = options.clone();
            tokio::spawn(async move {
                if let Err(err) = handler.release(&model, &acquired, &options, false).await {
                    warn!(%model, error = %err, "failed to release provider lock after stream end");
                }
            });
        });

        let upstream = to_upstream_stream(upstream);
        let transcoded = match mode {
            StreamMode::OpenaiPassthrough => router_stream::openai_passthrough(upstream, guard),
            StreamMode::OllamaPassthrough => router_stream::ollama_passthrough(upstream, guard),
            StreamMode::OpenaiToOllama => router_stream::openai_to_ollama(payload.model.clone(), upstream, guard),
            StreamMode::OllamaToOpenai => router_stream::ollama_to_openai(payload.model.clone(), upstream, guard),
        };

        info!(model = %payload.model, provider = %provider.id, ?mode, "streaming response to client");
        Ok(PipelineOutcome::Streaming {
            content_type: content_type_for(mode),
            body: transcoded,
        })
    }
}
