use thiserror::Error;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("[router-handler] unknown model \"{0}\"")]
    UnknownModel(String),

    #[error(transparent)]
    Strategy(#[from] router_lb::LbError),
}
