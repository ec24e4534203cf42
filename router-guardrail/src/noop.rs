use async_trait::async_trait;
use serde_json::Value;

use crate::error::GuardrailError;
use crate::traits::{GuardrailPlugin, GuardrailVerdict};

/// The guardrail used when no plugin is configured — every payload passes.
#[derive(Debug, Default)]
pub struct NoopGuardrail;

#[async_trait]
impl GuardrailPlugin for NoopGuardrail {
    async fn check(&self, _payload: &Value) -> Result<GuardrailVerdict, GuardrailError> {
        Ok(GuardrailVerdict::safe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_reports_safe() {
        let verdict = NoopGuardrail.check(&serde_json::json!({})).await.unwrap();
        assert!(verdict.safe);
    }
}
