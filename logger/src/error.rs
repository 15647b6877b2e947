use dlmm_core::error::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("failed to create directory for stream '{stream}' after retrying: {source}")]
    DirectoryCreation {
        stream: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io error writing stream '{stream}': {source}")]
    Io {
        stream: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<LoggerError> for EngineError {
    fn from(err: LoggerError) -> Self {
        EngineError::system(err.to_string())
    }
}
