//! `ChainPositionExecutor`: two-position (high/low) executor (spec §4.7,
//! "a second concrete executor managing two chained positions").

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dlmm_data::collaborators::{CreatePositionParams, DlmmClient, GasService, RpcClient, SendOptions, SwapClient};
use dlmm_integration::retry::{CancelToken, RetryExecutor};
use dlmm_risk::StopLossAction;
use tracing::{info, warn};

use crate::config::ExecutorConfig;
use crate::operation::{ExecutorRuntime, OperationRecord};
use crate::stage::Stage;
use crate::traits::{StrategyExecutor, TickInputs};

/// Manages two positions chained end-to-end across a wider band than a
/// single `SimpleYExecutor` position: a "low" half below the active bin and
/// a "high" half above it, created as two sequential transactions.
pub struct ChainPositionExecutor {
    dlmm: Arc<dyn DlmmClient>,
    #[allow(dead_code)]
    swap: Arc<dyn SwapClient>,
    rpc: Arc<dyn RpcClient>,
    gas: Arc<dyn GasService>,
    retry: RetryExecutor,
}

impl std::fmt::Debug for ChainPositionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainPositionExecutor").finish_non_exhaustive()
    }
}

impl ChainPositionExecutor {
    pub fn new(
        dlmm: Arc<dyn DlmmClient>,
        swap: Arc<dyn SwapClient>,
        rpc: Arc<dyn RpcClient>,
        gas: Arc<dyn GasService>,
        retry: RetryExecutor,
    ) -> Self {
        Self { dlmm, swap, rpc, gas, retry }
    }

    async fn close_all(
        &self,
        config: &ExecutorConfig,
        runtime: &ExecutorRuntime,
        cancel: &CancelToken,
    ) -> Result<(), dlmm_core::error::EngineError> {
        let bin_ids: Vec<i32> = (runtime.position_lower_bin..=runtime.position_upper_bin).collect();
        for position in runtime.positions.clone() {
            self.retry
                .execute("position.close", cancel, |_attempt| {
                    let dlmm = self.dlmm.clone();
                    let rpc = self.rpc.clone();
                    let pool = config.pool_address.clone();
                    let position = position.clone();
                    let bin_ids = bin_ids.clone();
                    let slippage = config.slippage_bps;
                    async move {
                        let tx = dlmm
                            .create_remove_liquidity_transaction(&pool, "self", &position, &bin_ids, slippage)
                            .await?;
                        rpc.send_transaction(
                            &tx,
                            SendOptions {
                                max_priority_fee_lamports: None,
                                skip_preflight: false,
                            },
                        )
                        .await?;
                        Ok(())
                    }
                })
                .await?;
        }
        Ok(())
    }

    async fn create_half(
        &self,
        config: &ExecutorConfig,
        lower_bin: i32,
        upper_bin: i32,
        cancel: &CancelToken,
    ) -> Result<String, dlmm_core::error::EngineError> {
        self.retry
            .execute("chain.position.create", cancel, |_attempt| {
                let dlmm = self.dlmm.clone();
                let rpc = self.rpc.clone();
                let pool = config.pool_address.clone();
                let amount = config.position_amount / rust_decimal::Decimal::TWO;
                let slippage = config.slippage_bps;
                async move {
                    let tx = dlmm
                        .create_position_transaction(CreatePositionParams {
                            pool,
                            lower_bin,
                            upper_bin,
                            amount,
                            slippage_bps: slippage,
                        })
                        .await?;
                    let submission = rpc
                        .send_transaction(
                            &tx,
                            SendOptions {
                                max_priority_fee_lamports: None,
                                skip_preflight: false,
                            },
                        )
                        .await?;
                    Ok(submission.signature.unwrap_or_default())
                }
            })
            .await
    }

    /// A minimum interval and a maximum estimated cost must both be honored
    /// before a Recreate decision is acted on (spec §4.6 final paragraph).
    fn recreation_guard_blocked(&self, runtime: &ExecutorRuntime, config: &ExecutorConfig) -> bool {
        if let Some(last) = runtime.last_recreation_at {
            if Utc::now().signed_duration_since(last) < config.min_recreation_interval() {
                return true;
            }
        }
        config.estimated_recreation_cost_percentage() > config.max_recreation_cost_percentage
    }

    /// Creates the low half then the high half. If the high half fails after
    /// the low half already landed, the instance is left with a single
    /// position and transitions to `Cleanup` rather than silently retrying
    /// past its policy limit (spec §4.7: "on exhaustion record a partial
    /// failure").
    async fn create_chained(
        &self,
        runtime: &mut ExecutorRuntime,
        config: &ExecutorConfig,
        active_bin: i32,
        cancel: &CancelToken,
    ) -> OperationRecord {
        let half_span = (runtime.position_upper_bin - runtime.position_lower_bin).max(2) / 2;
        let low_lower = active_bin - half_span;
        let low_upper = active_bin;
        let high_lower = active_bin;
        let high_upper = active_bin + half_span;

        let low = match self.create_half(config, low_lower, low_upper, cancel).await {
            Ok(address) => address,
            Err(err) => {
                runtime.error_count += 1;
                warn!(active_bin, error = %err, "chain position low half failed");
                return OperationRecord::failure("chain.position.create.low", active_bin, err.to_string());
            }
        };

        match self.create_half(config, high_lower, high_upper, cancel).await {
            Ok(high) => {
                runtime.positions = vec![low, high];
                runtime.position_lower_bin = low_lower;
                runtime.position_upper_bin = high_upper;
                runtime.transition(Stage::YPositionOnly);
                info!(active_bin, "chained positions created");
                OperationRecord::success("chain.position.create", active_bin).with_position(runtime.positions.join(","))
            }
            Err(err) => {
                runtime.error_count += 1;
                runtime.positions = vec![low];
                runtime.transition(Stage::Cleanup);
                warn!(active_bin, error = %err, "chain position high half exhausted retries; left in Cleanup with only the low half");
                OperationRecord::failure("chain.position.create.high", active_bin, err.to_string())
            }
        }
    }
}

#[async_trait]
impl StrategyExecutor for ChainPositionExecutor {
    async fn tick(
        &self,
        runtime: &mut ExecutorRuntime,
        config: &ExecutorConfig,
        inputs: TickInputs<'_>,
        cancel: &CancelToken,
    ) -> OperationRecord {
        let active_bin = inputs.snapshot.active_bin;
        runtime.execution_count += 1;

        if matches!(inputs.stop_loss.action, StopLossAction::FullExit) {
            let _ = self.gas.get_stop_loss_max_priority_fee().await;
            return match self.close_all(config, runtime, cancel).await {
                Ok(()) => {
                    runtime.transition(Stage::StopLossTriggered);
                    runtime.transition(Stage::Cleanup);
                    runtime.positions.clear();
                    runtime.transition(Stage::NoPosition);
                    info!(active_bin, "chain stop-loss full exit completed");
                    OperationRecord::success("stop_loss.full_exit", active_bin)
                }
                Err(err) => {
                    runtime.error_count += 1;
                    runtime.transition(Stage::Cleanup);
                    warn!(active_bin, error = %err, "chain stop-loss close failed");
                    OperationRecord::failure("stop_loss.full_exit", active_bin, err.to_string())
                }
            };
        }

        if inputs.recreation.is_recreate() {
            if self.recreation_guard_blocked(runtime, config) {
                info!(active_bin, "chain recreation skipped by interval/cost guard");
                return OperationRecord::success("recreation.guard_blocked", active_bin);
            }
            return match self.close_all(config, runtime, cancel).await {
                Ok(()) => {
                    runtime.positions.clear();
                    let record = self.create_chained(runtime, config, active_bin, cancel).await;
                    if record.success {
                        runtime.last_recreation_at = Some(Utc::now());
                    }
                    record
                }
                Err(err) => {
                    runtime.error_count += 1;
                    warn!(active_bin, error = %err, "chain recreation close failed");
                    OperationRecord::failure("recreation.close", active_bin, err.to_string())
                }
            };
        }

        if !runtime.positions.is_empty() {
            let in_range = inputs.snapshot.in_range();
            let target = if in_range { Stage::YPositionOnly } else { Stage::OutOfRange };
            if runtime.stage != target && (runtime.stage == Stage::YPositionOnly || runtime.stage == Stage::OutOfRange) {
                runtime.transition(target);
            }
        }

        let pending_yield = inputs.snapshot.current_pending_yield;
        if pending_yield >= config.yield_extraction_threshold {
            let now = Utc::now();
            let locked = runtime
                .last_fee_harvest_at
                .map(|last| now.signed_duration_since(last) < config.yield_extraction_time_lock())
                .unwrap_or(false);
            if !locked {
                runtime.last_fee_harvest_at = Some(now);
                info!(active_bin, "fees harvested");
                return OperationRecord::success("fees.harvest", active_bin).with_amount(pending_yield);
            }
        }

        OperationRecord::success("tick.observe", active_bin)
    }
}
