use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("[router-stream] {0}")]
    Transcode(String),
}
