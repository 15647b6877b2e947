use dlmm_core::error::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid strategy configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Invalid(message) => EngineError::validation(message),
        }
    }
}
