#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]

//! # dlmm-execution
//!
//! The two concrete strategy executors (spec §4.7): [`simple_y::SimpleYExecutor`]
//! manages a single position, [`chain_position::ChainPositionExecutor`] manages
//! two chained positions. Both implement [`traits::StrategyExecutor`] and share
//! the same per-tick shape: stop-loss first, then recreation, then fee harvest.

pub mod chain_position;
pub mod config;
pub mod error;
pub mod operation;
pub mod simple_y;
pub mod stage;
pub mod traits;

pub use chain_position::ChainPositionExecutor;
pub use config::ExecutorConfig;
pub use error::ExecutorError;
pub use operation::{ExecutorRuntime, OperationRecord};
pub use simple_y::SimpleYExecutor;
pub use stage::Stage;
pub use traits::{StrategyExecutor, TickInputs};
