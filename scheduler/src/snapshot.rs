//! The record persisted per instance (spec §4.9 `strategies/<id>.json`):
//! the Manager-owned [`StrategyInstance`] envelope plus the executor's own
//! mutable runtime, so a restart can resume a position without re-deriving
//! it from chain state alone.

use dlmm_execution::ExecutorRuntime;
use dlmm_strategies::StrategyInstance;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub instance: StrategyInstance,
    pub runtime: ExecutorRuntime,
}
