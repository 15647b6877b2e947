//! Error taxonomy shared across the DLMM strategy orchestration engine.
//!
//! Every crate in the workspace maps its own `thiserror` enum onto one of
//! the five [`ErrorCategory`] variants below, mirroring the way
//! `tucano_core::error::ToucanError` aggregates subsystem errors into a
//! single type. The category is what callers branch on; the inner message
//! is for humans.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Taxonomy used to decide retry/propagation behavior (spec §7).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum ErrorCategory {
    /// Transient RPC/timeout failures. Candidate for retry.
    Network,
    /// Bad configuration or address supplied by a caller. Never retried.
    Validation,
    /// On-chain failure, slippage, simulation failure. Candidate for retry.
    Execution,
    /// Missing or invalid parameter. Never retried.
    Configuration,
    /// I/O, storage, or other local system failure.
    System,
}

impl ErrorCategory {
    /// Configuration and Validation errors are surfaced immediately and never retried.
    pub fn is_retriable_category(self) -> bool {
        matches!(self, ErrorCategory::Network | ErrorCategory::Execution)
    }
}

/// Top level error type returned by core orchestration operations.
#[derive(Debug, Clone, Error, Deserialize, Serialize)]
#[error("{category:?}: {message}")]
pub struct EngineError {
    pub category: ErrorCategory,
    pub message: String,
}

impl EngineError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Network, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Validation, message)
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Execution, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Configuration, message)
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::System, message)
    }

    /// Short human string suitable for the `error` field of the public envelope.
    pub fn as_short(&self) -> String {
        format!("{:?}: {}", self.category, self.message)
    }
}

impl From<std::io::Error> for EngineError {
    fn from(value: std::io::Error) -> Self {
        Self::system(value.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(value: serde_json::Error) -> Self {
        Self::system(value.to_string())
    }
}
