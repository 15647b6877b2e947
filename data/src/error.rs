//! Errors raised while assembling a [`crate::snapshot::MarketSnapshot`].

use dlmm_core::error::EngineError;
use thiserror::Error;

/// Failures specific to the data-adapter pipeline; convertible into the
/// shared [`EngineError`] taxonomy at the crate boundary.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("collaborator call failed: {0}")]
    Collaborator(String),

    #[error("initial investment must be positive to compute net P&L")]
    ZeroInitialInvestment,

    #[error("price ring is empty; at least one sample is required")]
    EmptyPriceRing,
}

impl From<DataError> for EngineError {
    fn from(err: DataError) -> Self {
        match &err {
            DataError::Collaborator(_) => EngineError::network(err.to_string()),
            DataError::ZeroInitialInvestment | DataError::EmptyPriceRing => {
                EngineError::validation(err.to_string())
            }
        }
    }
}
