use async_trait::async_trait;
use dashmap::DashMap;
use router_config::Provider;

use crate::weighted_core;
use crate::{AcquireOptions, AcquiredProvider, LbError, LbStrategy};

/// Static-weighted selection: deterministic, not random. Weights come
/// straight from `Provider::weight`, clamped and normalized;
/// the CDF bucket is picked via a hash of `(model, total_uses)` so repeated
/// runs over the same counter history always choose the same sequence.
#[derive(Default)]
pub struct WeightedStrategy {
    counters: DashMap<(String, String), u64>,
}

impl WeightedStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    fn total_uses(&self, model: &str) -> u64 {
        self.counters
            .iter()
            .filter(|e| e.key().0 == model)
            .map(|e| *e.value())
            .sum()
    }
}

#[async_trait]
impl LbStrategy for WeightedStrategy {
    async fn acquire(
        &self,
        model: &str,
        providers: &[Provider],
        _options: &AcquireOptions,
    ) -> Result<AcquiredProvider, LbError> {
        if providers.is_empty() {
            return Err(LbError::NoProviders);
        }

        let weights: Vec<f32> = providers
            .iter()
            .map(|p| weighted_core::clamp_weight(p.weight))
            .collect();
        let probs = weighted_core::normalize(&weights);

        let total_uses = self.total_uses(model);
        let idx = weighted_core::pick_index(&probs, model, total_uses);

        let chosen = providers[idx].clone();
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

    fn provider(id: &str, weight: f32) -> Provider {
        Provider {
            id: id.to_string(),
            api_host: "http://unused".to_string(),
            api_token: String::new(),
            api_type: router_config::ApiType::Ollama,
            input_size: 0,
            model_path: None,
            weight,
            enabled: true,
            order: 0,
            keep_alive: None,
        }
    }

    #[tokio::test]
    async fn long_run_frequencies_converge_to_weights() {
        let strategy = WeightedStrategy::new();
        let providers = vec![provider("p1", 0.75), provider("p2", 0.25)];
        let options = AcquireOptions::default();

        let n = 4000;
        let mut p1_count = 0u64;
        for _ in 0..n {
            let acquired = strategy.acquire("m1", &providers, &options).await.unwrap();
            if acquired.provider.id == "p1" {
                p1_count += 1;
            }
        }

        let freq = p1_count as f64 / n as f64;
        assert!((freq - 0.75).abs() < 0.02, "frequency was {freq}");
    }

    #[tokio::test]
    async fn all_zero_weights_select_uniformly() {
        let strategy = WeightedStrategy::new();
        let providers = vec![provider("p1", 0.0), provider("p2", 0.0)];
        let options = AcquireOptions::default();

        let n = 2000;
        let mut p1_count = 0u64;
        for _ in 0..n {
            let acquired = strategy.acquire("m1", &providers, &options).await.unwrap();
            if acquired.provider.id == "p1" {
                p1_count += 1;
            }
        }
        let freq = p1_count as f64 / n as f64;
        assert!((freq - 0.5).abs() < 0.05, "frequency was {freq}");
    }
}
