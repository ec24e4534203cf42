//! Shared math for [`crate::WeightedStrategy`] and
//! [`crate::DynamicWeightedStrategy`] — kept in one place so both strategies
//! agree on exactly the same deterministic selection algorithm, ported from
//! `llm_router_api/core/lb/strategies/weighted.py`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Clamp a raw weight to `[0, 1]`; non-finite values default to `1.0`,
/// matching the Python strategy's "invalid input => 1.0" fallback.
pub fn clamp_weight(w: f32) -> f32 {
    if !w.is_finite() {
        return 1.0;
    }
    w.clamp(0.0, 1.0)
}

/// Normalize a list of already-clamped weights so they sum to `1.0`. A
/// zero-sum input falls back to a uniform distribution.
pub fn normalize(weights: &[f32]) -> Vec<f32> {
    let total: f32 = weights.iter().sum();
    if total <= 0.0 {
        let n = weights.len().max(1) as f32;
        return vec![1.0 / n; weights.len()];
    }
    weights.iter().map(|w| w / total).collect()
}

/// Deterministically picks the CDF bucket for `(model_name, total_uses)`.
/// Not randomness: the same counter state always yields the same pick,
/// which is what makes Weighted's long-run frequency convergence testable
/// with a fixed N.
pub fn pick_index(probs: &[f32], model_name: &str, total_uses: u64) -> usize {
    let mut hasher = DefaultHasher::new();
    (model_name, total_uses).hash(&mut hasher);
    let u = (hasher.finish() as u32) as f64 / (u32::MAX as f64 + 1.0);

    let mut acc = 0.0f64;
    for (i, p) in probs.iter().enumerate() {
        acc += *p as f64;
        if u <= acc {
            return i;
        }
    }
    probs.len().saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_always_pick_same_index() {
        let probs = normalize(&[0.5, 0.5]);
        let a = pick_index(&probs, "m1", 7);
        let b = pick_index(&probs, "m1", 7);
        assert_eq!(a, b);
    }

    #[test]
    fn all_zero_weights_fall_back_to_uniform() {
        let probs = normalize(&[0.0, 0.0, 0.0]);
        assert!(probs.iter().all(|p| (*p - 1.0 / 3.0).abs() < 1e-6));
    }
}
