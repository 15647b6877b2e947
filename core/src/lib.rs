#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]

//! # dlmm-core
//!
//! Shared primitives for the DLMM strategy orchestration engine: the error
//! taxonomy (spec §7), stable [`ids::StrategyInstanceId`] identifiers, the
//! public operation [`envelope::OperationResult`], graceful-shutdown traits,
//! and configuration validation helpers.
//!
//! Every other crate in the workspace depends on this one and nothing else
//! in it depends back, the same leaf position `tucano-core`'s error/shutdown
//! modules occupy relative to the rest of the Toucan ecosystem.

pub mod envelope;
pub mod error;
pub mod ids;
pub mod shutdown;
pub mod validate;

pub use envelope::{OperationMeta, OperationResult};
pub use error::{EngineError, ErrorCategory};
pub use ids::{StrategyInstanceId, StrategyType};
