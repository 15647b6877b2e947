
//! "dlmm-engine" facade crate
//!
//! Provides a single entry point that re-exports every crate of the DLMM
//! strategy orchestration engine. Useful for callers who prefer to depend
//! on just one crate rather than naming each workspace member individually.
//!
//! # Example
//! ```rust
//! use dlmm_engine::core; // access modules via re-export
//! use dlmm_engine::core::ids::StrategyType; // strategy-type enum
//! let _kind = StrategyType::SimpleY;
//! // Manager available at dlmm_engine::scheduler::Manager, construction
//! // requires the collaborator trait objects described in the core crate's
//! // `core::error` / `data::collaborators` modules.
//! ```

// Re-export of internal crates with organized namespaces
pub use dlmm_core as core;
pub use dlmm_data as data;
pub use dlmm_execution as execution;
pub use dlmm_integration as integration;
pub use dlmm_logger as logger;
pub use dlmm_risk as risk;
pub use dlmm_scheduler as scheduler;
pub use dlmm_storage as storage;
pub use dlmm_strategies as strategies;

// Flat (shallow) re-export of very frequently used symbols
pub use dlmm_core::error::EngineError;
pub use dlmm_core::ids::{StrategyInstanceId, StrategyType};
pub use dlmm_scheduler::Manager;
pub use dlmm_strategies::StrategyConfig;

/// Optional prelude for single import.
pub mod prelude {
    pub use crate::core::envelope::{OperationMeta, OperationResult};
    pub use crate::core::error::EngineError;
    pub use crate::core::ids::{StrategyInstanceId, StrategyType};
    pub use crate::execution::{StrategyExecutor, TickInputs};
    pub use crate::risk::{RecreationDecision, StopLossDecision};
    pub use crate::scheduler::{Manager, WorkerDeps};
    pub use crate::strategies::StrategyConfig;
}
