use thiserror::Error;

/// Coordination-store errors. Treated as transient at the call site:
/// readers degrade to empty results, writers log and continue, and a
/// store error must never leak into a lock-leak.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("[router-store] connection error: {0}")]
    Connection(String),

    #[error("[router-store] operation failed: {0}")]
    Operation(String),
}

impl StoreError {
    /// Whether the call site should treat this as a transient, retriable
    /// failure rather than a hard error.
    pub fn retriable(&self) -> bool {
        matches!(self, StoreError::Connection(_))
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::Operation(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
