use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use futures_util::{Stream, StreamExt};
use router_config::Provider;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::{HttpError, make_snippet};
use crate::payload::{prepend_system_prompt, split_by_user_message, user_message_indices};

/// A live upstream byte stream, already wrapped so transport failures mid-read
/// surface as [`HttpError::Transport`] rather than a bare `reqwest::Error`.
pub type UpstreamBytes = Pin<Box<dyn Stream<Item = Result<Bytes, HttpError>> + Send>>;

/// Dispatches outbound requests to upstream providers. One `reqwest::Client`
/// per `(provider id, timeout)` pair, cached the way
/// `LlmServiceProfiles` caches clients by `ClientKey` — reusing connection
/// pools across requests to the same provider instead of rebuilding a
/// client (and its TLS handshake machinery) every call.
pub struct HttpExecutor {
    clients: DashMap<(String, u64), reqwest::Client>,
    default_timeout: Duration,
}

impl HttpExecutor {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            clients: DashMap::new(),
            default_timeout,
        }
    }

    fn client_for(&self, provider: &Provider, timeout: Duration) -> reqwest::Client {
        let key = (provider.id.clone(), timeout.as_secs());
        if let Some(client) = self.clients.get(&key) {
            return client.clone();
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client builds with a plain timeout");
        self.clients.insert(key, client.clone());
        client
    }

    fn request(
        &self,
        url: &str,
        provider: &Provider,
    ) -> reqwest::RequestBuilder {
        let client = self.client_for(provider, self.default_timeout);
        let mut builder = client.post(url).header("Content-Type", "application/json");
        if !provider.api_token.is_empty() {
            builder = builder.bearer_auth(&provider.api_token);
        }
        builder
    }

    /// Single non-streaming call. If `system_prompt` is set it's prepended
    /// to `payload["messages"]` before the request is sent.
    pub async fn dispatch_blocking(
        &self,
        url: &str,
        provider: &Provider,
        mut payload: Value,
        system_prompt: Option<&str>,
    ) -> Result<Value, HttpError> {
        if let Some(prompt) = system_prompt {
            prepend_system_prompt(&mut payload, prompt);
        }

        debug!(url, provider = %provider.id, "dispatching blocking request");
        let resp = self
            .request(url, provider)
            .json(&payload)
            .send()
            .await
            .map_err(|source| HttpError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let snippet = make_snippet(&text);
            error!(%status, url, snippet, "upstream returned non-success status");
            return Err(HttpError::HttpStatus {
                status,
                url: url.to_string(),
                snippet,
            });
        }

        resp.json().await.map_err(|e| HttpError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Opens a streaming upstream call, returning the raw byte stream for a
    /// transcoder to consume. `accept` sets the `Accept` header when the
    /// caller needs the upstream to emit SSE rather than its default shape.
    pub async fn dispatch_stream(
        &self,
        url: &str,
        provider: &Provider,
        payload: Value,
        accept: Option<&str>,
    ) -> Result<UpstreamBytes, HttpError> {
        let mut builder = self.request(url, provider).json(&payload);
        if let Some(accept) = accept {
            builder = builder.header("Accept", accept);
        }

        debug!(url, provider = %provider.id, "opening streaming request");
        let resp = builder.send().await.map_err(|source| HttpError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let snippet = make_snippet(&text);
            error!(%status, url, snippet, "upstream returned non-success status for a streaming request");
            return Err(HttpError::HttpStatus {
                status,
                url: url.to_string(),
                snippet,
            });
        }

        let url_owned = url.to_string();
        let stream = resp.bytes_stream().map(move |item| {
            item.map_err(|source| HttpError::Transport {
                url: url_owned.clone(),
                source,
            })
        });
        Ok(Box::pin(stream))
    }

    /// Splits a multi-user-message payload into N single-user-message
    /// payloads, calls each sequentially (preserving conversation-order
    /// semantics against stateful providers, not concurrently), and
    /// delegates aggregation of the raw responses to the caller.
    pub async fn dispatch_fanout(
        &self,
        url: &str,
        provider: &Provider,
        payload: Value,
        aggregator: impl Fn(Vec<Value>) -> Value,
    ) -> Result<Value, HttpError> {
        if user_message_indices(&payload).len() <= 1 {
            return self.dispatch_blocking(url, provider, payload, None).await;
        }

        let mut responses = Vec::new();
        for part in split_by_user_message(&payload) {
            let response = self.dispatch_blocking(url, provider, part, None).await?;
            responses.push(response);
        }
        Ok(aggregator(responses))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> Provider {
        Provider {
            id: "p1".to_string(),
            api_host: "http://unused".to_string(),
            api_token: String::new(),
            api_type: router_config::ApiType::OpenAi,
            input_size: 0,
            model_path: None,
            weight: 1.0,
            enabled: true,
            order: 0,
            keep_alive: None,
        }
    }

    #[test]
    fn client_for_same_provider_and_timeout_is_reused() {
        let executor = HttpExecutor::new(Duration::from_secs(30));
        let p = provider();
        let a = executor.client_for(&p, Duration::from_secs(30));
        let b = executor.client_for(&p, Duration::from_secs(30));
        // reqwest::Client is a cheap Arc-backed handle; same underlying
        // connection pool means the cache returned the same entry rather
        // than building a fresh client, so the cache must hold exactly one.
        assert_eq!(executor.clients.len(), 1);
        drop((a, b));
    }

    #[test]
    fn different_timeouts_get_distinct_clients() {
        let executor = HttpExecutor::new(Duration::from_secs(30));
        let p = provider();
        executor.client_for(&p, Duration::from_secs(5));
        executor.client_for(&p, Duration::from_secs(10));
        assert_eq!(executor.clients.len(), 2);
    }
}
