use async_trait::async_trait;
use dashmap::DashMap;
use router_config::Provider;

use crate::{AcquireOptions, AcquiredProvider, LbError, LbStrategy};

/// Round-robin-by-usage: always picks the provider with the lowest local
/// usage counter for this model, ties broken by list order. Purely local —
/// no distributed state, no health filtering.
#[derive(Default)]
pub struct BalancedStrategy {
    counters: DashMap<(String, String), u64>,
}

impl BalancedStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LbStrategy for BalancedStrategy {
    async fn acquire(
        &self,
        model: &str,
        providers: &[Provider],
        _options: &AcquireOptions,
    ) -> Result<AcquiredProvider, LbError> {
        if providers.is_empty() {
            return Err(LbError::NoProviders);
        }

        let mut best_idx = 0usize;
        let mut best_count = u64::MAX;
        for (idx, p) in providers.iter().enumerate() {
            let count = self
                .counters
                .get(&(model.to_string(), p.id.clone()))
                .map(|c| *c)
                .unwrap_or(0);
            if count < best_count {
                best_count = count;
                best_idx = idx;
            }
        }

        let chosen = providers[best_idx].clone();
        *self
            .counters
            .entry((model.to_string(), chosen.id.clone()))
            .or_insert(0) += 1;

        Ok(AcquiredProvider { provider: chosen })
    }

    async fn release(
        &self,
        _model: &str,
        _acquired: &AcquiredProvider,
        _options: &AcquireOptions,
    ) -> Result<(), LbError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(id: &str, order: u32) -> Provider {
        Provider {
            id: id.to_string(),
            api_host: "http://unused".to_string(),
            api_token: String::new(),
            api_type: router_config::ApiType::Ollama,
            input_size: 0,
            model_path: None,
            weight: 1.0,
            enabled: true,
            order,
            keep_alive: None,
        }
    }

    #[tokio::test]
    async fn alternates_fairly_between_two_providers() {
        let strategy = BalancedStrategy::new();
        let providers = vec![provider("p1", 0), provider("p2", 1)];
        let options = AcquireOptions::default();

        let mut picks = Vec::new();
        for _ in 0..10 {
            let acquired = strategy.acquire("m1", &providers, &options).await.unwrap();
            picks.push(acquired.provider.id.clone());
            strategy.release("m1", &acquired, &options).await.unwrap();
        }

        assert_eq!(
            picks,
            vec!["p1", "p2", "p1", "p2", "p1", "p2", "p1", "p2", "p1", "p2"]
        );
    }

    #[tokio::test]
    async fn empty_providers_is_an_error() {
        let strategy = BalancedStrategy::new();
        let err = strategy
            .acquire("m1", &[], &AcquireOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LbError::NoProviders));
    }
}
