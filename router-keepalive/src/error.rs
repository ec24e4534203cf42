#[derive(Debug, thiserror::Error)]
pub enum KeepAliveError {
    #[error("coordination store error: {0}")]
    Store(#[from] router_store::StoreError),
}

pub type Result<T> = std::result::Result<T, KeepAliveError>;
