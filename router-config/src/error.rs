use thiserror::Error;

/// Errors produced while loading and validating a [`crate::ModelConfig`].
///
/// The core never attempts a partial load: any of these aborts startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("[router-config] failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("[router-config] failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("[router-config] config document must be a JSON object at the top level")]
    NotAnObject,

    #[error("[router-config] active model \"{family}/{model}\" does not exist in its family")]
    UnknownActiveModel { family: String, model: String },

    #[error("[router-config] model \"{family}/{model}\" has no providers")]
    EmptyModel { family: String, model: String },

    #[error(
        "[router-config] provider \"{id}\" on model \"{family}/{model}\" is missing api_host"
    )]
    MissingApiHost {
        family: String,
        model: String,
        id: String,
    },

    #[error("[router-config] model \"{family}/{model}\" has duplicate provider id \"{id}\"")]
    DuplicateProviderId {
        family: String,
        model: String,
        id: String,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
