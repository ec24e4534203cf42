use std::sync::Arc;
use std::time::Duration;

use router_config::Provider;
use router_health::HealthMonitor;
use router_store::CoordinationStore;

use crate::balanced::BalancedStrategy;
use crate::dynamic_weighted::DynamicWeightedStrategy;
use crate::first_available::FirstAvailableStrategy;
use crate::first_available_optimized::FirstAvailableOptimizedStrategy;
use crate::weighted::WeightedStrategy;
use crate::{AcquireOptions, AcquiredProvider, LbError, LbStrategy};

/// Everything the strategies need to construct themselves, gathered in one
/// place so the facade's constructor doesn't grow a parameter per strategy.
pub struct StrategyDeps {
    pub store: Arc<dyn CoordinationStore>,
    pub health: Arc<HealthMonitor>,
    pub check_interval: Duration,
    pub acquire_timeout: Duration,
    pub dynamic_weighted_history_size: usize,
}

/// Resolves a strategy by its configured name and dispatches to it. One
/// facade per model family, built once at startup from the active config.
pub struct StrategyFacade {
    strategy: Arc<dyn LbStrategy>,
}

impl StrategyFacade {
    /// `name` matches the values accepted in provider/model configuration:
    /// `"balanced"`, `"weighted"`, `"dynamic_weighted"`, `"first_available"`,
    /// `"first_available_optimized"`.
    pub fn new(name: &str, deps: StrategyDeps) -> Result<Self, LbError> {
        let strategy: Arc<dyn LbStrategy> = match name {
            "balanced" => Arc::new(BalancedStrategy::new()),
            "weighted" => Arc::new(WeightedStrategy::new()),
            "dynamic_weighted" => {
                Arc::new(DynamicWeightedStrategy::new(deps.dynamic_weighted_history_size))
            }
            "first_available" => Arc::new(FirstAvailableStrategy::new(
                deps.store,
                deps.health,
                deps.check_interval,
                deps.acquire_timeout,
            )),
            "first_available_optimized" => {
                let inner = Arc::new(FirstAvailableStrategy::new(
                    deps.store.clone(),
                    deps.health,
                    deps.check_interval,
                    deps.acquire_timeout,
                ));
                Arc::new(FirstAvailableOptimizedStrategy::new(deps.store, inner))
            }
            other => return Err(LbError::UnknownStrategy(other.to_string())),
        };
        Ok(Self { strategy })
    }

    pub async fn acquire(
        &self,
        model: &str,
        providers: &[Provider],
        options: &AcquireOptions,
    ) -> Result<AcquiredProvider, LbError> {
        self.strategy.acquire(model, providers, options).await
    }

    pub async fn release(
        &self,
        model: &str,
        acquired: &AcquiredProvider,
        options: &AcquireOptions,
    ) -> Result<(), LbError> {
        self.strategy.release(model, acquired, options).await
    }

    /// Returns the first configured provider without locking anything —
    /// used when a guardrail-blocked stream still needs a provider shape to
    /// resolve protocol descriptors against. `release_fake` is a no-op.
    pub fn acquire_fake(&self, providers: &[Provider]) -> Result<AcquiredProvider, LbError> {
        providers
            .first()
            .cloned()
            .map(|provider| AcquiredProvider { provider })
            .ok_or(LbError::NoProviders)
    }

    pub fn release_fake(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_store::InMemoryStore;

    fn deps() -> StrategyDeps {
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
        let health = Arc::new(HealthMonitor::new(store.clone(), 30));
        StrategyDeps {
            store,
            health,
            check_interval: Duration::from_millis(10),
            acquire_timeout: Duration::from_secs(1),
            dynamic_weighted_history_size: 100,
        }
    }

    #[test]
    fn unknown_strategy_name_is_rejected() {
        let err = StrategyFacade::new("nonexistent", deps()).unwrap_err();
        assert!(matches!(err, LbError::UnknownStrategy(name) if name == "nonexistent"));
    }

    #[test]
    fn every_known_name_constructs() {
        for name in [
            "balanced",
            "weighted",
            "dynamic_weighted",
            "first_available",
            "first_available_optimized",
        ] {
            assert!(StrategyFacade::new(name, deps()).is_ok(), "{name} should construct");
        }
    }
}
