use std::sync::atomic::{AtomicU64, Ordering};

/// In-process counters for guardrail/masker side effects. Metrics export to
/// an external monitoring system is out of scope, but the counters
/// themselves are ambient observability this crate carries regardless — a
/// `/metrics`-shaped endpoint in the `api` crate reads these.
#[derive(Debug, Default)]
pub struct ProxyMetrics {
    pub guardrail_incidents: AtomicU64,
    pub masker_incidents: AtomicU64,
}

impl ProxyMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_guardrail_incident(&self) {
        self.guardrail_incidents.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_masker_incident(&self) {
        self.masker_incidents.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> (u64, u64) {
        (
            self.guardrail_incidents.load(Ordering::Relaxed),
            self.masker_incidents.load(Ordering::Relaxed),
        )
    }
}
