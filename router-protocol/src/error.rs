use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("[router-protocol] unknown protocol family \"{0}\"")]
    UnknownFamily(String),
}
