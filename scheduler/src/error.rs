use dlmm_core::error::EngineError;
use dlmm_core::ids::StrategyInstanceId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no instance registered with id '{0}'")]
    NotFound(StrategyInstanceId),

    #[error("instance '{id}' is already running")]
    AlreadyRunning { id: StrategyInstanceId },

    #[error("invalid configuration: {0}")]
    Config(#[from] dlmm_strategies::ConfigError),

    #[error("storage failure: {0}")]
    Storage(#[from] dlmm_storage::StorageError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<SchedulerError> for EngineError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::Config(e) => e.into(),
            SchedulerError::Storage(e) => e.into(),
            SchedulerError::Engine(e) => e,
            other => EngineError::system(other.to_string()),
        }
    }
}
