use thiserror::Error;

#[derive(Debug, Error)]
pub enum LbError {
    #[error("[router-lb] no providers configured for this model")]
    NoProviders,

    #[error("[router-lb] unknown strategy \"{0}\"")]
    UnknownStrategy(String),

    #[error("[router-lb] timed out acquiring a provider for model \"{model}\" after {timeout_secs}s")]
    Timeout { model: String, timeout_secs: u64 },

    #[error(transparent)]
    Store(#[from] router_store::StoreError),
}
