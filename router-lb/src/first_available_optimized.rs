use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use router_config::Provider;
use router_store::{CoordinationStore, keys};

use crate::first_available::FirstAvailableStrategy;
use crate::{AcquireOptions, AcquiredProvider, LbError, LbStrategy};

/// Host-affinity wrapper around [`FirstAvailableStrategy`], ported from
/// `FirstAvailableOptimStrategy` in
/// `llm_router_api/core/lb/strategies/first_available_optim.py`.
///
/// Tries, in order, to reuse the host used by the model's previous request,
/// then any other host already carrying the model, then an entirely unused
/// host, before falling back to the plain first-available acquisition. Each
/// step still claims the provider's lock field through the inner strategy —
/// host affinity only changes *which* candidate is tried first.
pub struct FirstAvailableOptimizedStrategy {
    store: Arc<dyn CoordinationStore>,
    inner: Arc<FirstAvailableStrategy>,
}

impl FirstAvailableOptimizedStrategy {
    pub fn new(store: Arc<dyn CoordinationStore>, inner: Arc<FirstAvailableStrategy>) -> Self {
        Self { store, inner }
    }

    fn host_of(provider: &Provider) -> &str {
        provider.api_host.as_str()
    }

    /// A host is free for `model` when its occupancy hash has no `model`
    /// field, or the field already names this same model.
    async fn host_free_for(&self, model: &str, host: &str) -> bool {
        let occupancy_key = keys::host_key(host);
        match self.store.hash_get(&occupancy_key, "model").await {
            Ok(Some(occupant)) => occupant == model,
            Ok(None) => true,
            Err(_) => true,
        }
    }

    async fn try_claim(&self, model: &str, candidate: &Provider) -> Option<AcquiredProvider> {
        if !self.host_free_for(model, Self::host_of(candidate)).await {
            return None;
        }
        let model_key = keys::model_key(model);
        let field = keys::provider_field(&candidate.id);
        match self.store.hash_set_if_absent_or_false(&model_key, &field).await {
            Ok(true) => Some(AcquiredProvider {
                provider: candidate.clone(),
            }),
            _ => None,
        }
    }

    async fn record_selection(&self, model: &str, acquired: &AcquiredProvider) {
        let host = Self::host_of(&acquired.provider);
        let last_host_key = keys::last_host_key(model);
        if let Err(err) = self.store.key_set(&last_host_key, host).await {
            tracing::warn!(model, host, error = %err, "failed to record last host");
        }
        let hosts_key = keys::model_hosts_set_key(model);
        if let Err(err) = self.store.set_add(&hosts_key, host).await {
            tracing::warn!(model, host, error = %err, "failed to record hosts set");
        }
        let occupancy_key = keys::host_key(host);
        if let Err(err) = self.store.hash_set(&occupancy_key, "model", model).await {
            tracing::warn!(model, host, error = %err, "failed to record host occupancy");
        }
    }

    async fn clear_occupancy(&self, host: &str) {
        let occupancy_key = keys::host_key(host);
        if let Err(err) = self.store.hash_del(&occupancy_key, "model").await {
            tracing::warn!(host, error = %err, "failed to clear host occupancy");
        }
    }
}

#[async_trait]
impl LbStrategy for FirstAvailableOptimizedStrategy {
    async fn acquire(
        &self,
        model: &str,
        providers: &[Provider],
        options: &AcquireOptions,
    ) -> Result<AcquiredProvider, LbError> {
        if providers.is_empty() {
            return Err(LbError::NoProviders);
        }

        // Step 1: reuse the host the previous request landed on.
        let last_host_key = keys::last_host_key(model);
        if let Ok(Some(host)) = self.store.key_get(&last_host_key).await {
            if let Some(candidate) = providers.iter().find(|p| Self::host_of(p) == host) {
                if let Some(acquired) = self.try_claim(model, candidate).await {
                    self.record_selection(model, &acquired).await;
                    return Ok(acquired);
                }
            }
        }

        // Step 2: any other host already known to have served this model.
        let hosts_key = keys::model_hosts_set_key(model);
        let known_hosts: HashSet<String> = self
            .store
            .set_members(&hosts_key)
            .await
            .unwrap_or_default()
            .into_iter()
            .collect();
        if !known_hosts.is_empty() {
            for candidate in providers.iter().filter(|p| known_hosts.contains(Self::host_of(p))) {
                if let Some(acquired) = self.try_claim(model, candidate).await {
                    self.record_selection(model, &acquired).await;
                    return Ok(acquired);
                }
            }
        }

        // Step 3: a host never used for this model before.
        for candidate in providers.iter().filter(|p| !known_hosts.contains(Self::host_of(p))) {
            if let Some(acquired) = self.try_claim(model, candidate).await {
                self.record_selection(model, &acquired).await;
                return Ok(acquired);
            }
        }

        // Fallback: plain first-available retry loop across every candidate.
        let acquired = self.inner.acquire(model, providers, options).await?;
        self.record_selection(model, &acquired).await;
        Ok(acquired)
    }

    async fn release(
        &self,
        model: &str,
        acquired: &AcquiredProvider,
        options: &AcquireOptions,
    ) -> Result<(), LbError> {
        self.clear_occupancy(Self::host_of(&acquired.provider)).await;
        self.inner.release(model, acquired, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_health::HealthMonitor;
    use router_store::InMemoryStore;
    use std::time::Duration;

    fn provider(id: &str, host: &str) -> Provider {
        Provider {
            id: id.to_string(),
            api_host: host.to_string(),
            api_token: String::new(),
            api_type: router_config::ApiType::Ollama,
            input_size: 0,
            model_path: None,
            weight: 1.0,
            enabled: true,
            order: 0,
            keep_alive: None,
        }
    }

    fn make(store: Arc<dyn CoordinationStore>) -> FirstAvailableOptimizedStrategy {
        let health = Arc::new(HealthMonitor::new(store.clone(), 30));
        let inner = Arc::new(FirstAvailableStrategy::new(
            store.clone(),
            health,
            Duration::from_millis(5),
            Duration::from_millis(200),
        ));
        FirstAvailableOptimizedStrategy::new(store, inner)
    }

    #[tokio::test]
    async fn second_request_reuses_last_host() {
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
        let strategy = make(store.clone());
        let providers = vec![provider("p1", "http://host-a"), provider("p2", "http://host-b")];
        let options = AcquireOptions::default();

        let first = strategy.acquire("m1", &providers, &options).await.unwrap();
        strategy.release("m1", &first, &options).await.unwrap();

        let second = strategy.acquire("m1", &providers, &options).await.unwrap();
        assert_eq!(second.provider.api_host, first.provider.api_host);
    }

    #[tokio::test]
    async fn busy_last_host_falls_back_to_an_unused_host() {
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
        let strategy = make(store.clone());
        let providers = vec![provider("p1", "http://host-a"), provider("p2", "http://host-b")];
        let options = AcquireOptions::default();

        let first = strategy.acquire("m1", &providers, &options).await.unwrap();
        assert_eq!(first.provider.api_host, "http://host-a");

        // host-a's single provider is still locked; second acquire must not
        // block on it since host-b has never been used for this model.
        let second = strategy.acquire("m1", &providers, &options).await.unwrap();
        assert_eq!(second.provider.api_host, "http://host-b");
    }

    #[tokio::test]
    async fn host_occupied_by_another_model_is_skipped() {
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
        let strategy = make(store.clone());
        store
            .hash_set(&keys::host_key("http://host-a"), "model", "other-model")
            .await
            .unwrap();
        let providers = vec![provider("p1", "http://host-a"), provider("p2", "http://host-b")];
        let options = AcquireOptions::default();

        let acquired = strategy.acquire("m1", &providers, &options).await.unwrap();
        assert_eq!(acquired.provider.api_host, "http://host-b");
    }
}
