use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuardrailError {
    #[error("[router-guardrail] guardrail check failed: {0}")]
    CheckFailed(String),
}

#[derive(Debug, Error)]
pub enum UtilsError {
    #[error("[router-guardrail] utils plugin failed: {0}")]
    Failed(String),
}
