use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use router_config::{ModelConfig, Provider};
use router_http::HttpExecutor;
use router_protocol::{Descriptor, Family};
use router_store::{CoordinationStore, keys};
use serde_json::json;
use tracing::{debug, warn};

use crate::duration::parse_keep_alive;

fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the unix epoch")
        .as_secs()
}

/// Strips the `"model:"` prefix the coordination-store member keys sometimes
/// carry, mirroring `KeepAliveMonitor._find_provider`'s normalization of both
/// sides of the comparison before matching.
fn normalize_model_name(name: &str) -> &str {
    name.strip_prefix("model:").unwrap_or(name)
}

fn find_provider<'a>(config: &'a ModelConfig, model_name: &str, host: &str) -> Option<(&'a str, &'a Provider)> {
    let normalized = normalize_model_name(model_name);
    let model = config.model(normalized)?;
    let provider = model.providers.iter().find(|p| p.api_host == host)?;
    Some((model.name.as_str(), provider))
}

fn endpoint_for(provider: &Provider) -> String {
    let descriptor = Descriptor::for_family(Family::from(provider.api_type));
    format!("{}{}", provider.api_host.trim_end_matches('/'), descriptor.chat_path)
}

/// A minimal chat completion sent with no purpose but to keep the provider's
/// model resident in memory. Mirrors the synthetic request body the original
/// keep-alive monitor posts on a wakeup.
fn synthetic_payload(model_name: &str) -> serde_json::Value {
    json!({
        "stream": false,
        "model": model_name,
        "messages": [{"role": "user", "content": "Send an empty message."}],
        "max_tokens": 56,
        "temperature": 0.0,
    })
}

/// Background worker that fires synthetic chat requests at providers whose
/// idle-warmup window is about to lapse, keeping their model weights
/// resident without routing real traffic through the full proxy pipeline
/// (guardrails, masking, load balancing are all bypassed here).
pub struct KeepAliveScheduler {
    store: Arc<dyn CoordinationStore>,
    http: Arc<HttpExecutor>,
    config: Arc<ModelConfig>,
    check_interval: Duration,
}

impl KeepAliveScheduler {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        http: Arc<HttpExecutor>,
        config: Arc<ModelConfig>,
        check_interval: Duration,
    ) -> Self {
        Self {
            store,
            http,
            config,
            check_interval,
        }
    }

    /// Runs forever. Intended to be `tokio::spawn`ed exactly once.
    pub async fn run(self: Arc<Self>) {
        loop {
            self.tick().await;
            tokio::time::sleep(self.check_interval).await;
        }
    }

    async fn tick(&self) {
        let now = now_epoch();
        let due = match self
            .store
            .sorted_set_range_by_score(keys::KEEPALIVE_WAKEUPS_KEY, now as f64)
            .await
        {
            Ok(members) => members,
            Err(err) => {
                warn!(error = %err, "failed to read due keep-alive wakeups");
                return;
            }
        };

        for member in due {
            self.fire_one(&member, now).await;
        }
    }

    async fn fire_one(&self, member: &str, now: u64) {
        let Some((model_name, host)) = member.split_once('|') else {
            warn!(member, "malformed keep-alive member, dropping");
            let _ = self.store.sorted_set_rem(keys::KEEPALIVE_WAKEUPS_KEY, member).await;
            return;
        };

        let Some((resolved_name, provider)) = find_provider(&self.config, model_name, host) else {
            debug!(model_name, host, "provider no longer configured, dropping wakeup");
            let _ = self.store.sorted_set_rem(keys::KEEPALIVE_WAKEUPS_KEY, member).await;
            return;
        };
        let provider = provider.clone();
        let resolved_name = resolved_name.to_string();

        let keep_alive_secs = provider
            .keep_alive
            .as_deref()
            .and_then(parse_keep_alive)
            .unwrap_or(0);
        if keep_alive_secs == 0 {
            let _ = self.store.sorted_set_rem(keys::KEEPALIVE_WAKEUPS_KEY, member).await;
            return;
        }

        let occupancy_key = keys::host_key(host);
        let occupant = self.store.hash_get(&occupancy_key, "model").await.unwrap_or(None);
        if let Some(occupant_model) = occupant {
            if occupant_model != resolved_name {
                debug!(host, %occupant_model, "host busy with another model; deferring wakeup");
                self.reschedule(member, keep_alive_secs, now).await;
                return;
            }
        }

        let url = endpoint_for(&provider);
        let payload = synthetic_payload(provider.remote_model_name(&resolved_name));
        match self.http.dispatch_blocking(&url, &provider, payload, None).await {
            Ok(_) => debug!(model = %resolved_name, host, "keep-alive ping sent"),
            Err(err) => warn!(model = %resolved_name, host, error = %err, "keep-alive ping failed"),
        }

        self.reschedule(member, keep_alive_secs, now).await;
    }

    async fn reschedule(&self, member: &str, keep_alive_secs: u64, now: u64) {
        let next = (now + keep_alive_secs) as f64;
        if let Err(err) = self
            .store
            .sorted_set_add(keys::KEEPALIVE_WAKEUPS_KEY, member, next)
            .await
        {
            warn!(member, error = %err, "failed to reschedule keep-alive wakeup");
        }
    }
}
