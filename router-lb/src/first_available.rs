use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::seq::SliceRandom;
use router_config::{Model, Provider};
use router_health::HealthMonitor;
use router_store::{CoordinationStore, keys};

use crate::{AcquireOptions, AcquiredProvider, LbError, LbStrategy};

/// Distributed first-available selection, grounded in
/// `llm_router_api/core/lb/strategies/first_available.py`: atomically claims
/// a provider's `is_chosen` hash field via
/// [`CoordinationStore::hash_set_if_absent_or_false`], retrying against the
/// live (health-checked) candidate list until one is claimed or `timeout`
/// elapses.
pub struct FirstAvailableStrategy {
    store: Arc<dyn CoordinationStore>,
    health: Arc<HealthMonitor>,
    check_interval: Duration,
    timeout: Duration,
}

impl FirstAvailableStrategy {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        health: Arc<HealthMonitor>,
        check_interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            health,
            check_interval,
            timeout,
        }
    }

    /// Clears every configured model's lock hash. Intended to be called once
    /// at startup when clearing stale locks left behind by a previous crash.
    pub async fn clear_all_locks(&self, model_names: &[String]) -> Result<(), LbError> {
        let model_keys: Vec<String> = model_names.iter().map(|m| keys::model_key(m)).collect();
        if !model_keys.is_empty() {
            self.store.delete(&model_keys).await?;
        }
        Ok(())
    }

    async fn active_candidates(&self, model: &str, providers: &[Provider]) -> Vec<Provider> {
        let ephemeral = Model {
            name: model.to_string(),
            family: String::new(),
            providers: providers.to_vec(),
        };
        self.health.get_providers(&ephemeral, true).await
    }
}

#[async_trait]
impl LbStrategy for FirstAvailableStrategy {
    async fn acquire(
        &self,
        model: &str,
        providers: &[Provider],
        options: &AcquireOptions,
    ) -> Result<AcquiredProvider, LbError> {
        if providers.is_empty() {
            return Err(LbError::NoProviders);
        }

        let start = Instant::now();
        let model_key = keys::model_key(model);

        loop {
            if start.elapsed() > self.timeout {
                return Err(LbError::Timeout {
                    model: model.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }

            let mut candidates = self.active_candidates(model, providers).await;
            if !candidates.is_empty() {
                if options.random_choice {
                    candidates.shuffle(&mut rand::thread_rng());
                }

                for p in &candidates {
                    let field = keys::provider_field(&p.id);
                    match self.store.hash_set_if_absent_or_false(&model_key, &field).await {
                        Ok(true) => return Ok(AcquiredProvider { provider: p.clone() }),
                        Ok(false) => continue,
                        Err(err) => {
                            tracing::warn!(model, provider = %p.id, error = %err, "lock acquisition attempt failed");
                            continue;
                        }
                    }
                }
            }

            tokio::time::sleep(self.check_interval).await;
        }
    }

    async fn release(
        &self,
        model: &str,
        acquired: &AcquiredProvider,
        _options: &AcquireOptions,
    ) -> Result<(), LbError> {
        let model_key = keys::model_key(model);
        let field = keys::provider_field(&acquired.provider.id);
        self.store.hash_del(&model_key, &field).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_store::InMemoryStore;

    fn provider(id: &str) -> Provider {
        Provider {
            id: id.to_string(),
            api_host: "http://unused".to_string(),
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

    fn make_strategy(
        store: Arc<dyn CoordinationStore>,
        timeout: Duration,
    ) -> (Arc<HealthMonitor>, FirstAvailableStrategy) {
        let health = Arc::new(HealthMonitor::new(store.clone(), 30));
        let strategy =
            FirstAvailableStrategy::new(store, health.clone(), Duration::from_millis(10), timeout);
        (health, strategy)
    }

    #[tokio::test]
    async fn single_provider_contention_serializes_two_acquires() {
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
        let (health, strategy) = make_strategy(store.clone(), Duration::from_secs(2));
        let providers = vec![provider("p1")];
        let model = Model {
            name: "m1".into(),
            family: "chat".into(),
            providers: providers.clone(),
        };
        health.register(&model);
        store
            .hash_set(&router_store::keys::availability_key("m1"), "p1", "true")
            .await
            .unwrap();

        let options = AcquireOptions::default();
        let first = strategy.acquire("m1", &providers, &options).await.unwrap();

        let strategy = Arc::new(strategy);
        let strategy2 = strategy.clone();
        let providers2 = providers.clone();
        let handle = tokio::spawn(async move {
            strategy2
                .acquire("m1", &providers2, &AcquireOptions::default())
                .await
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!handle.is_finished());

        strategy.release("m1", &first, &options).await.unwrap();
        let second = handle.await.unwrap().unwrap();
        assert_eq!(second.provider.id, "p1");
    }

    #[tokio::test]
    async fn zero_active_providers_times_out_instead_of_deadlocking() {
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
        let (health, strategy) = make_strategy(store, Duration::from_millis(50));
        let providers = vec![provider("p1")];
        let model = Model {
            name: "m1".into(),
            family: "chat".into(),
            providers: providers.clone(),
        };
        health.register(&model);
        // No availability entries written => get_providers(only_active=true) is empty.

        let err = strategy
            .acquire("m1", &providers, &AcquireOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LbError::Timeout { .. }));
    }
}
