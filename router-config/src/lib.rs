//! Typed model/provider registry: reads the JSON model-config file into an
//! immutable snapshot shared by the handler, the health monitor, and the
//! keep-alive scheduler.

pub mod error;
pub mod model_config;
pub mod provider;

pub use error::ConfigError;
pub use model_config::ModelConfig;
pub use provider::{ApiType, Model, Provider};
