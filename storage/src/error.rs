use dlmm_core::error::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize value for key '{key}': {source}")]
    Serde {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no snapshot found for key '{0}'")]
    NotFound(String),

    #[error("snapshot for key '{key}' is version {found}, this build only migrates up to {supported}")]
    UnsupportedVersion { key: String, found: u32, supported: u32 },
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => EngineError::validation(err.to_string()),
            StorageError::UnsupportedVersion { .. } => EngineError::validation(err.to_string()),
            StorageError::Io { .. } | StorageError::Serde { .. } => EngineError::system(err.to_string()),
        }
    }
}
