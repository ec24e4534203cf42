use async_trait::async_trait;
use serde_json::Value;

use crate::error::{GuardrailError, UtilsError};

/// The outcome of a guardrail check: `safe=false` routes the pipeline into
/// its blocked-content branch, carrying an optional human-readable reason.
#[derive(Debug, Clone)]
pub struct GuardrailVerdict {
    pub safe: bool,
    pub reason: Option<String>,
}

impl GuardrailVerdict {
    pub fn safe() -> Self {
        Self {
            safe: true,
            reason: None,
        }
    }

    pub fn unsafe_with(reason: impl Into<String>) -> Self {
        Self {
            safe: false,
            reason: Some(reason.into()),
        }
    }
}

/// Accepts a request payload, returns a pass/fail verdict. The pipeline
/// never inspects why a plugin judged content unsafe beyond the verdict's
/// `reason` field — rule internals are a plugin concern, not this crate's.
#[async_trait]
pub trait GuardrailPlugin: Send + Sync {
    async fn check(&self, payload: &Value) -> Result<GuardrailVerdict, GuardrailError>;
}

/// Mutates a payload in place (masking PII, redacting secrets, ...);
/// returns whether anything was actually changed so the pipeline can track
/// masker-incident counts without re-diffing the payload itself.
pub trait MaskerPlugin: Send + Sync {
    fn mask(&self, payload: &mut Value) -> bool;
}

/// Arbitrary pre-dispatch payload transforms (prompt rewriting, parameter
/// injection, ...) that don't fit the guardrail/masker shape.
#[async_trait]
pub trait UtilsPlugin: Send + Sync {
    async fn run(&self, payload: &mut Value) -> Result<(), UtilsError>;
}
