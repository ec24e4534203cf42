use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;
use dashmap::DashMap;
use router_config::Provider;

use crate::weighted_core;
use crate::{AcquireOptions, AcquiredProvider, LbError, LbStrategy};

/// [`crate::WeightedStrategy`] with runtime-mutable weights and a bounded
/// per-provider latency history, ported from `DynamicWeightedStrategy` in
/// `weighted.py`.
pub struct DynamicWeightedStrategy {
    counters: DashMap<(String, String), u64>,
    dynamic_weights: DashMap<String, f32>,
    latency_history: DashMap<String, Mutex<VecDeque<f64>>>,
    last_chosen: DashMap<String, Instant>,
    history_size: usize,
}

impl DynamicWeightedStrategy {
    pub fn new(history_size: usize) -> Self {
        Self {
            counters: DashMap::new(),
            dynamic_weights: DashMap::new(),
            latency_history: DashMap::new(),
            last_chosen: DashMap::new(),
            history_size,
        }
    }

    /// Overrides the static config weight for a provider key (clamped to
    /// `[0, 1]`). Takes precedence over `Provider::weight` until the process
    /// restarts — this strategy's state is intentionally not distributed.
    pub fn set_weight(&self, provider_key: &str, weight: f32) {
        self.dynamic_weights
            .insert(provider_key.to_string(), weighted_core::clamp_weight(weight));
    }

    /// Oldest-to-newest interval history (seconds) between consecutive picks
    /// of this provider.
    pub fn get_latency_history(&self, provider_key: &str) -> Vec<f64> {
        self.latency_history
            .get(provider_key)
            .map(|d| d.lock().expect("latency history lock").iter().copied().collect())
            .unwrap_or_default()
    }

    fn total_uses(&self, model: &str) -> u64 {
        self.counters
            .iter()
            .filter(|e| e.key().0 == model)
            .map(|e| *e.value())
            .sum()
    }

    fn weights_for(&self, providers: &[Provider]) -> Vec<f32> {
        providers
            .iter()
            .map(|p| {
                self.dynamic_weights
                    .get(&p.id)
                    .map(|w| *w)
                    .unwrap_or_else(|| weighted_core::clamp_weight(p.weight))
            })
            .collect()
    }

    fn record_latency(&self, provider_key: &str) {
        let now = Instant::now();
        if let Some(prev) = self.last_chosen.get(provider_key) {
            let interval = now.duration_since(*prev).as_secs_f64();
            let entry = self
                .latency_history
                .entry(provider_key.to_string())
                .or_insert_with(|| Mutex::new(VecDeque::with_capacity(self.history_size.min(1024))));
            let mut hist = entry.lock().expect("latency history lock");
            if hist.len() == self.history_size {
                hist.pop_front();
            }
            hist.push_back(interval);
        }
        self.last_chosen.insert(provider_key.to_string(), now);
    }
}

#[async_trait]
impl LbStrategy for DynamicWeightedStrategy {
    async fn acquire(
        &self,
        model: &str,
        providers: &[Provider],
        _options: &AcquireOptions,
    ) -> Result<AcquiredProvider, LbError> {
        if providers.is_empty() {
            return Err(LbError::NoProviders);
        }

        let weights = self.weights_for(providers);
        let probs = weighted_core::normalize(&weights);
        let total_uses = self.total_uses(model);
        let idx = weighted_core::pick_index(&probs, model, total_uses);

        let chosen = providers[idx].clone();
        self.record_latency(&chosen.id);
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
    async fn dynamic_weight_overrides_static_config() {
        let strategy = DynamicWeightedStrategy::new(10_000);
        let providers = vec![provider("p1", 1.0), provider("p2", 0.0)];
        strategy.set_weight("p2", 1.0);
        strategy.set_weight("p1", 0.0);

        let options = AcquireOptions::default();
        let mut p2_count = 0;
        let n = 200;
        for _ in 0..n {
            let acquired = strategy.acquire("m1", &providers, &options).await.unwrap();
            if acquired.provider.id == "p2" {
                p2_count += 1;
            }
        }
        assert_eq!(p2_count, n);
    }

    #[tokio::test]
    async fn latency_history_records_intervals_oldest_first() {
        let strategy = DynamicWeightedStrategy::new(10_000);
        let providers = vec![provider("p1", 1.0)];
        let options = AcquireOptions::default();

        strategy.acquire("m1", &providers, &options).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        strategy.acquire("m1", &providers, &options).await.unwrap();

        let history = strategy.get_latency_history("p1");
        assert_eq!(history.len(), 1);
        assert!(history[0] >= 0.0);
    }
}
