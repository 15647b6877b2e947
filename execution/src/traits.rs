//! Shared shape for the concrete executors (spec §4.7: "two concrete
//! executors implementing a shared trait").

use async_trait::async_trait;
use dlmm_data::MarketSnapshot;
use dlmm_integration::retry::CancelToken;
use dlmm_risk::{RecreationDecision, StopLossDecision};

use crate::config::ExecutorConfig;
use crate::operation::{ExecutorRuntime, OperationRecord};

/// Inputs an executor needs for one tick, already computed by the caller
/// (the Data Adapter snapshot and both decision modules' verdicts).
pub struct TickInputs<'a> {
    pub snapshot: &'a MarketSnapshot,
    pub stop_loss: &'a StopLossDecision,
    pub recreation: &'a RecreationDecision,
}

#[async_trait]
pub trait StrategyExecutor: Send + Sync {
    /// Drive one tick: stop-loss first, then recreation, then fee harvest
    /// (spec §4.7 steps 2-5). Mutates `runtime` in place and returns the
    /// operation record to log.
    async fn tick(
        &self,
        runtime: &mut ExecutorRuntime,
        config: &ExecutorConfig,
        inputs: TickInputs<'_>,
        cancel: &CancelToken,
    ) -> OperationRecord;
}
