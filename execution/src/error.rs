use dlmm_core::error::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("{operation} failed: {source}")]
    Collaborator {
        operation: &'static str,
        #[source]
        source: EngineError,
    },

    #[error("close succeeded but recreate failed after retries; instance left in Cleanup: {0}")]
    PartialRecreationFailure(EngineError),
}

impl From<ExecutorError> for EngineError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::Collaborator { source, .. } => source,
            ExecutorError::PartialRecreationFailure(source) => source,
        }
    }
}
