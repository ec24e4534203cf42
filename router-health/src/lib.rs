//! Background worker that probes every registered provider on a timer and
//! writes active/inactive status into the coordination store's
//! `availability:<model>` hash. Consulted read-only by the load-balancing
//! strategies via [`HealthMonitor::get_providers`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashSet;
use router_config::{ApiType, Model, Provider};
use router_store::{keys, CoordinationStore};
use serde::Serialize;
use tracing::{debug, info, warn};

/// A serializable health snapshot for a single provider, mirroring the
/// shape the original `ai-llm-service` health probe returns.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub model: String,
    pub provider_id: String,
    pub endpoint: String,
    pub ok: bool,
    pub latency_ms: u128,
    pub message: String,
}

/// Background daemon. Construct once, `register` every model as it is first
/// used, and spawn [`HealthMonitor::run`] exactly once from the binary.
pub struct HealthMonitor {
    store: Arc<dyn CoordinationStore>,
    client: reqwest::Client,
    check_interval: Duration,
    probe_timeout: Duration,
    registered: DashSet<String>,
    models: dashmap::DashMap<String, Vec<Provider>>,
}

impl HealthMonitor {
    pub fn new(store: Arc<dyn CoordinationStore>, check_interval_secs: u64) -> Self {
        Self {
            store,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(1))
                .build()
                .expect("reqwest client"),
            check_interval: Duration::from_secs(check_interval_secs),
            probe_timeout: Duration::from_secs(1),
            registered: DashSet::new(),
            models: dashmap::DashMap::new(),
        }
    }

    /// Registers a model's provider list for background probing. Idempotent:
    /// the first call wins, subsequent calls for the same model are no-ops.
    pub fn register(&self, model: &Model) {
        if !self.registered.insert(model.name.clone()) {
            return;
        }
        self.models.insert(model.name.clone(), model.providers.clone());
        info!(model = %model.name, providers = model.providers.len(), "registered model for health probing");
    }

    /// Runs the probe loop forever. Intended to be `tokio::spawn`ed once.
    pub async fn run(self: Arc<Self>) {
        loop {
            self.probe_once().await;
            tokio::time::sleep(self.check_interval).await;
        }
    }

    async fn probe_once(&self) {
        let snapshot: Vec<(String, Vec<Provider>)> = self
            .models
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        for (model_name, providers) in snapshot {
            let futs = providers
                .iter()
                .filter(|p| p.enabled)
                .map(|p| self.probe_provider(&model_name, p));
            let results: Vec<HealthStatus> = futures::future::join_all(futs).await;

            let availability_key = keys::availability_key(&model_name);
            for status in &results {
                if let Err(err) = self
                    .store
                    .hash_set(
                        &availability_key,
                        &status.provider_id,
                        if status.ok { "true" } else { "false" },
                    )
                    .await
                {
                    warn!(model = %model_name, error = %err, "failed to write availability status");
                }
            }
        }
    }

    async fn probe_provider(&self, model_name: &str, provider: &Provider) -> HealthStatus {
        let url = if provider.api_type == ApiType::Vllm {
            format!("{}/health", provider.api_host.trim_end_matches('/'))
        } else {
            provider.api_host.clone()
        };

        let start = Instant::now();
        let result = self.client.get(&url).timeout(self.probe_timeout).send().await;
        let latency_ms = start.elapsed().as_millis();

        match result {
            Ok(resp) => {
                let ok = resp.status().as_u16() < 500;
                HealthStatus {
                    model: model_name.to_string(),
                    provider_id: provider.id.clone(),
                    endpoint: url,
                    ok,
                    latency_ms,
                    message: format!("status {}", resp.status()),
                }
            }
            Err(err) => HealthStatus {
                model: model_name.to_string(),
                provider_id: provider.id.clone(),
                endpoint: url,
                ok: false,
                latency_ms,
                message: err.to_string(),
            },
        }
    }

    /// The live, filtered provider list for a model. Degrades to an empty
    /// list on store error rather than propagating the failure — readers
    /// must never block strategy selection on a coordination-store hiccup.
    pub async fn get_providers(&self, model: &Model, only_active: bool) -> Vec<Provider> {
        let enabled: Vec<Provider> = model
            .providers
            .iter()
            .filter(|p| p.enabled)
            .cloned()
            .collect();

        if !only_active {
            return enabled;
        }

        let availability_key = keys::availability_key(&model.name);
        let statuses: HashMap<String, String> = match self.store.hash_get_all(&availability_key).await {
            Ok(pairs) => pairs.into_iter().collect(),
            Err(err) => {
                warn!(model = %model.name, error = %err, "availability read failed; degrading to empty list");
                return Vec::new();
            }
        };

        enabled
            .into_iter()
            .filter(|p| statuses.get(&p.id).map(|v| v == "true").unwrap_or(false))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_config::{ApiType, Provider};
    use router_store::InMemoryStore;

    fn provider(id: &str) -> Provider {
        Provider {
            id: id.to_string(),
            api_host: "http://unused".to_string(),
            api_token: String::new(),
            api_type: ApiType::Ollama,
            input_size: 0,
            model_path: None,
            weight: 1.0,
            enabled: true,
            order: 0,
            keep_alive: None,
        }
    }

    #[tokio::test]
    async fn availability_filters_only_true_entries() {
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
        let monitor = HealthMonitor::new(store.clone(), 30);
        let model = Model {
            name: "m1".into(),
            family: "chat".into(),
            providers: vec![provider("p1"), provider("p2")],
        };
        monitor.register(&model);

        store
            .hash_set(&keys::availability_key("m1"), "p1", "true")
            .await
            .unwrap();
        store
            .hash_set(&keys::availability_key("m1"), "p2", "false")
            .await
            .unwrap();

        let active = monitor.get_providers(&model, true).await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "p1");
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
        let monitor = HealthMonitor::new(store, 30);
        let model = Model {
            name: "m1".into(),
            family: "chat".into(),
            providers: vec![provider("p1")],
        };
        monitor.register(&model);
        monitor.register(&model);
        assert_eq!(monitor.models.len(), 1);
    }
}
