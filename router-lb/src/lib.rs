//! Load-balancing strategy engine: one provider-selection policy per model
//! per request, plus the facade that resolves a strategy by its configured
//! name. Every strategy implements the same [`LbStrategy`] trait so the
//! handler above never needs to know which one is active.

mod balanced;
mod dynamic_weighted;
mod error;
mod facade;
mod first_available;
mod first_available_optimized;
mod weighted;
mod weighted_core;

pub use balanced::BalancedStrategy;
pub use dynamic_weighted::DynamicWeightedStrategy;
pub use error::LbError;
pub use facade::{StrategyDeps, StrategyFacade};
pub use first_available::FirstAvailableStrategy;
pub use first_available_optimized::FirstAvailableOptimizedStrategy;
pub use weighted::WeightedStrategy;

use async_trait::async_trait;
use router_config::Provider;

/// Per-acquire flags passed down from the proxy pipeline's retry logic.
#[derive(Debug, Clone, Default)]
pub struct AcquireOptions {
    /// Forces random candidate order in First-Available(-Optimized); set by
    /// the pipeline's retry loop after the first failed attempt.
    pub random_choice: bool,
}

/// The result of a successful `acquire`: the provider plus whatever the
/// strategy needs to mirror it back on `release`. Strategies never hand out
/// raw locking state to callers — everything needed to release lives here.
#[derive(Debug, Clone)]
pub struct AcquiredProvider {
    pub provider: Provider,
}

/// Common interface for every load-balancing policy.
#[async_trait]
pub trait LbStrategy: Send + Sync {
    async fn acquire(
        &self,
        model: &str,
        providers: &[Provider],
        options: &AcquireOptions,
    ) -> Result<AcquiredProvider, LbError>;

    async fn release(
        &self,
        model: &str,
        acquired: &AcquiredProvider,
        options: &AcquireOptions,
    ) -> Result<(), LbError>;
}
