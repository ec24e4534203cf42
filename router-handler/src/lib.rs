//! Single point of contact the proxy pipeline uses to turn a model name
//! into a locked provider and back: combines the immutable model registry
//! with the strategy facade behind one serializing mutex.

mod error;

pub use error::HandlerError;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use router_config::ModelConfig;
use router_lb::{AcquireOptions, AcquiredProvider, StrategyFacade};

/// A provider as exposed to `list_active_models()` callers — `api_token` and
/// `model_path` are stripped since this shape reaches HTTP listing
/// endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderDescriptor {
    pub id: String,
    pub api_host: String,
    pub enabled: bool,
    pub order: u32,
}

impl From<&router_config::Provider> for ProviderDescriptor {
    fn from(p: &router_config::Provider) -> Self {
        Self {
            id: p.id.clone(),
            api_host: p.api_host.clone(),
            enabled: p.enabled,
            order: p.order,
        }
    }
}

/// Thread-safe facade the proxy pipeline calls into. All strategy
/// interaction goes through a single mutex — strategies other than the
/// purely-local ones (Balanced/Weighted) need exclusive access anyway to
/// keep their candidate-list-then-claim sequence atomic from this layer's
/// point of view.
pub struct ModelHandler {
    config: Arc<ModelConfig>,
    facade: Arc<Mutex<StrategyFacade>>,
}

impl ModelHandler {
    pub fn new(config: Arc<ModelConfig>, facade: StrategyFacade) -> Self {
        Self {
            config,
            facade: Arc::new(Mutex::new(facade)),
        }
    }

    /// Validates the model exists, then delegates to the strategy facade.
    /// `fake=true` bypasses locking entirely (used by the guardrail
    /// short-circuit path).
    pub async fn acquire(
        &self,
        model_name: &str,
        options: &AcquireOptions,
        fake: bool,
    ) -> Result<AcquiredProvider, HandlerError> {
        let model = self
            .config
            .model(model_name)
            .ok_or_else(|| HandlerError::UnknownModel(model_name.to_string()))?;
        let providers: Vec<router_config::Provider> =
            model.enabled_providers().into_iter().cloned().collect();

        let facade = self.facade.lock().await;
        if fake {
            return Ok(facade.acquire_fake(&providers)?);
        }
        Ok(facade.acquire(model_name, &providers, options).await?)
    }

    pub async fn release(
        &self,
        model_name: &str,
        acquired: &AcquiredProvider,
        options: &AcquireOptions,
        fake: bool,
    ) -> Result<(), HandlerError> {
        if fake {
            let facade = self.facade.lock().await;
            facade.release_fake();
            return Ok(());
        }
        let facade = self.facade.lock().await;
        Ok(facade.release(model_name, acquired, options).await?)
    }

    /// Family → provider-descriptor listing for every active model.
    pub fn list_active_models(&self) -> HashMap<String, Vec<ProviderDescriptor>> {
        let mut out = HashMap::new();
        for (_family, models) in self.config.active_models() {
            for model in models {
                let descriptors = model.providers.iter().map(ProviderDescriptor::from).collect();
                out.insert(model.name.clone(), descriptors);
            }
        }
        out
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_health::HealthMonitor;
    use router_lb::StrategyDeps;
    use router_store::{CoordinationStore, InMemoryStore};
    use std::time::Duration;

    fn config_fixture() -> Arc<ModelConfig> {
        Arc::new(
            ModelConfig::from_str(
                r#"{
                    "chat": {
                        "m1": { "providers": [
                            { "id": "p1", "api_host": "http://up1", "api_type": "ollama" },
                            { "id": "p2", "api_host": "http://up2", "api_type": "ollama" }
                        ]}
                    },
                    "active_models": { "chat": ["m1"] }
                }"#,
            )
            .unwrap(),
        )
    }

    fn handler_with_strategy(name: &str) -> ModelHandler {
        let config = config_fixture();
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
        let health = Arc::new(HealthMonitor::new(store.clone(), 30));
        let deps = StrategyDeps {
            store,
            health,
            check_interval: Duration::from_millis(10),
            acquire_timeout: Duration::from_secs(1),
            dynamic_weighted_history_size: 100,
        };
        let facade = StrategyFacade::new(name, deps).unwrap();
        ModelHandler::new(config, facade)
    }

    fn handler() -> ModelHandler {
        handler_with_strategy("balanced")
    }

    #[tokio::test]
    async fn unknown_model_is_rejected() {
        let handler = handler();
        let err = handler
            .acquire("does-not-exist", &AcquireOptions::default(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::UnknownModel(name) if name == "does-not-exist"));
    }

    #[tokio::test]
    async fn acquire_then_release_round_trips() {
        let handler = handler();
        let options = AcquireOptions::default();
        let acquired = handler.acquire("m1", &options, false).await.unwrap();
        handler.release("m1", &acquired, &options, false).await.unwrap();
    }

    #[tokio::test]
    async fn fake_acquire_never_locks_a_provider() {
        let handler = handler();
        let options = AcquireOptions::default();
        let fake = handler.acquire("m1", &options, true).await.unwrap();
        assert_eq!(fake.provider.id, "p1");
        // A real acquire for the same model must still succeed immediately —
        // nothing was locked by the fake path.
        let real = handler.acquire("m1", &options, false).await.unwrap();
        handler.release("m1", &real, &options, false).await.unwrap();
    }

    #[test]
    fn list_active_models_strips_token_and_model_path() {
        let handler = handler();
        let listing = handler.list_active_models();
        let providers = listing.get("m1").expect("m1 listed");
        assert_eq!(providers.len(), 2);
    }
}
