//! `SimpleYExecutor`: single-position executor (spec §4.7, SimpleY shape).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dlmm_data::collaborators::{
    CreatePositionParams, DlmmClient, ExecuteSwapParams, GasService, RpcClient, SendOptions, SwapClient,
};
use dlmm_integration::retry::{CancelToken, RetryExecutor};
use dlmm_risk::{RecreationAction, StopLossAction};
use tracing::{info, warn};

use crate::config::ExecutorConfig;
use crate::operation::{ExecutorRuntime, OperationRecord};
use crate::stage::Stage;
use crate::traits::{StrategyExecutor, TickInputs};

pub struct SimpleYExecutor {
    dlmm: Arc<dyn DlmmClient>,
    swap: Arc<dyn SwapClient>,
    rpc: Arc<dyn RpcClient>,
    gas: Arc<dyn GasService>,
    retry: RetryExecutor,
}

impl std::fmt::Debug for SimpleYExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleYExecutor").finish_non_exhaustive()
    }
}

impl SimpleYExecutor {
    pub fn new(
        dlmm: Arc<dyn DlmmClient>,
        swap: Arc<dyn SwapClient>,
        rpc: Arc<dyn RpcClient>,
        gas: Arc<dyn GasService>,
        retry: RetryExecutor,
    ) -> Self {
        Self { dlmm, swap, rpc, gas, retry }
    }

    async fn close_position(
        &self,
        config: &ExecutorConfig,
        runtime: &ExecutorRuntime,
        cancel: &CancelToken,
        op_name: &'static str,
    ) -> Result<(), dlmm_core::error::EngineError> {
        let Some(position) = runtime.positions.first().cloned() else {
            return Ok(());
        };
        let bin_ids: Vec<i32> = (runtime.position_lower_bin..=runtime.position_upper_bin).collect();
        self.retry
            .execute(op_name, cancel, |_attempt| {
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
            .await
    }

    async fn create_position(
        &self,
        config: &ExecutorConfig,
        lower_bin: i32,
        upper_bin: i32,
        cancel: &CancelToken,
        op_name: &'static str,
    ) -> Result<String, dlmm_core::error::EngineError> {
        self.retry
            .execute(op_name, cancel, |_attempt| {
                let dlmm = self.dlmm.clone();
                let rpc = self.rpc.clone();
                let pool = config.pool_address.clone();
                let amount = config.position_amount;
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

    async fn swap_to_quote(&self, config: &ExecutorConfig, cancel: &CancelToken) -> Result<(), dlmm_core::error::EngineError> {
        self.retry
            .execute("stop.loss.token.swap", cancel, |_attempt| {
                let swap = self.swap.clone();
                let amount = config.position_amount;
                let slippage = config.slippage_bps;
                async move {
                    swap.execute_swap(ExecuteSwapParams {
                        input_mint: "base".to_string(),
                        output_mint: "quote".to_string(),
                        amount,
                        slippage_bps: slippage,
                    })
                    .await?;
                    Ok(())
                }
            })
            .await
    }

    /// A minimum interval and a maximum estimated cost must both be honored
    /// before a Recreate decision is acted on (spec §4.6 final paragraph).
    fn recreation_guard_blocked(&self, runtime: &ExecutorRuntime, config: &ExecutorConfig) -> Option<&'static str> {
        if let Some(last) = runtime.last_recreation_at {
            if Utc::now().signed_duration_since(last) < config.min_recreation_interval() {
                return Some("minimum recreation interval not yet elapsed");
            }
        }
        if config.estimated_recreation_cost_percentage() > config.max_recreation_cost_percentage {
            return Some("estimated recreation cost exceeds the configured maximum");
        }
        None
    }

    fn maybe_harvest_fees(&self, runtime: &mut ExecutorRuntime, config: &ExecutorConfig, pending_yield: rust_decimal::Decimal) -> bool {
        if pending_yield < config.yield_extraction_threshold {
            return false;
        }
        let now = Utc::now();
        let locked = runtime
            .last_fee_harvest_at
            .map(|last| now.signed_duration_since(last) < config.yield_extraction_time_lock())
            .unwrap_or(false);
        if locked {
            return false;
        }
        runtime.last_fee_harvest_at = Some(now);
        true
    }
}

#[async_trait]
impl StrategyExecutor for SimpleYExecutor {
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
            return match self.close_position(config, runtime, cancel, "stop.loss").await {
                Ok(()) => match self.swap_to_quote(config, cancel).await {
                    Ok(()) => {
                        runtime.transition(Stage::StopLossTriggered);
                        runtime.transition(Stage::Cleanup);
                        runtime.positions.clear();
                        runtime.transition(Stage::NoPosition);
                        info!(active_bin, "stop-loss full exit completed");
                        OperationRecord::success("stop_loss.full_exit", active_bin)
                    }
                    Err(err) => {
                        runtime.error_count += 1;
                        runtime.transition(Stage::Cleanup);
                        warn!(active_bin, error = %err, "stop-loss swap failed after close");
                        OperationRecord::failure("stop_loss.full_exit", active_bin, err.to_string())
                    }
                },
                Err(err) => {
                    runtime.error_count += 1;
                    warn!(active_bin, error = %err, "stop-loss close failed");
                    OperationRecord::failure("stop_loss.full_exit", active_bin, err.to_string())
                }
            };
        }

        if inputs.recreation.is_recreate() {
            return self.recreate(runtime, config, inputs, cancel).await;
        }

        if !runtime.positions.is_empty() {
            let in_range = inputs.snapshot.in_range();
            let target = if in_range { Stage::YPositionOnly } else { Stage::OutOfRange };
            if runtime.stage != target && (runtime.stage == Stage::YPositionOnly || runtime.stage == Stage::OutOfRange) {
                runtime.transition(target);
            }
        }

        if self.maybe_harvest_fees(runtime, config, inputs.snapshot.current_pending_yield) {
            info!(active_bin, "fees harvested");
            return OperationRecord::success("fees.harvest", active_bin).with_amount(inputs.snapshot.current_pending_yield);
        }

        OperationRecord::success("tick.observe", active_bin)
    }
}

impl SimpleYExecutor {
    async fn recreate(
        &self,
        runtime: &mut ExecutorRuntime,
        config: &ExecutorConfig,
        inputs: TickInputs<'_>,
        cancel: &CancelToken,
    ) -> OperationRecord {
        let active_bin = inputs.snapshot.active_bin;

        if let Some(reason) = self.recreation_guard_blocked(runtime, config) {
            info!(active_bin, reason, "recreation skipped by interval/cost guard");
            return OperationRecord::success("recreation.guard_blocked", active_bin);
        }

        match self.close_position(config, runtime, cancel, "position.close").await {
            Err(err) => {
                runtime.error_count += 1;
                warn!(active_bin, error = %err, "recreation close failed");
                OperationRecord::failure("recreation.close", active_bin, err.to_string())
            }
            Ok(()) => {
                let half_span = (runtime.position_upper_bin - runtime.position_lower_bin).max(1) / 2;
                let lower = active_bin - half_span;
                let upper = active_bin + half_span;
                match self.create_position(config, lower, upper, cancel, "position.create").await {
                    Ok(address) => {
                        runtime.positions = vec![address.clone()];
                        runtime.position_lower_bin = lower;
                        runtime.position_upper_bin = upper;
                        runtime.last_recreation_at = Some(Utc::now());
                        runtime.transition(Stage::YPositionOnly);
                        info!(active_bin, %address, "position recreated");
                        OperationRecord::success("recreation.recreate", active_bin).with_position(address)
                    }
                    Err(err) => {
                        runtime.error_count += 1;
                        runtime.positions.clear();
                        runtime.transition(Stage::Cleanup);
                        warn!(active_bin, error = %err, "recreation create exhausted retries; left in Cleanup");
                        OperationRecord::failure("recreation.recreate", active_bin, err.to_string())
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlmm_core::error::EngineError;
    use dlmm_data::collaborators::{
        CreatePositionParams as CPP, PnlReport, PoolPriceAndBin, SwapOutcome, SwapQuote, TransactionSubmission,
        UnsignedTransaction, YieldStats,
    };
    use dlmm_data::snapshot::{BenchmarkYieldRates, HistoricalPriceChanges, HistoricalYieldRates, MarketSnapshot, YieldTrend};
    use dlmm_integration::EventBus;
    use dlmm_risk::{RecreationDecision, RecreationReason, StopLossDecision, Urgency};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct StubDlmm;
    #[async_trait]
    impl DlmmClient for StubDlmm {
        async fn get_active_bin(&self, _pool: &str) -> Result<i32, EngineError> {
            Ok(50)
        }
        async fn get_pool_price_and_bin(&self, _pool: &str) -> Result<PoolPriceAndBin, EngineError> {
            Ok(PoolPriceAndBin { price: dec!(1), active_bin: 50 })
        }
        async fn calculate_bin_price(&self, _pool: &str, _bin_id: i32) -> Result<Decimal, EngineError> {
            Ok(dec!(1))
        }
        async fn create_position_transaction(&self, _params: CPP) -> Result<UnsignedTransaction, EngineError> {
            Ok(UnsignedTransaction { payload_base64: "tx".to_string() })
        }
        async fn create_remove_liquidity_transaction(
            &self,
            _pool: &str,
            _user: &str,
            _position: &str,
            _bin_ids: &[i32],
            _slippage_bps: u16,
        ) -> Result<UnsignedTransaction, EngineError> {
            Ok(UnsignedTransaction { payload_base64: "tx".to_string() })
        }
        async fn subscribe_active_bin_changes(
            &self,
            _pool: &str,
            _callback: Box<dyn Fn(i32) + Send + Sync>,
        ) -> Result<u64, EngineError> {
            Ok(1)
        }
    }

    struct StubSwap;
    #[async_trait]
    impl SwapClient for StubSwap {
        async fn get_quote(&self, _i: &str, _o: &str, _a: Decimal, _s: u16) -> Result<SwapQuote, EngineError> {
            Ok(SwapQuote { amount_out: dec!(1), price_impact_bps: 0 })
        }
        async fn execute_swap(&self, _params: ExecuteSwapParams) -> Result<SwapOutcome, EngineError> {
            Ok(SwapOutcome {
                signature: "sig".to_string(),
                amount_in: dec!(1),
                amount_out: dec!(1),
                price_impact_bps: 0,
            })
        }
    }

    struct StubRpc;
    #[async_trait]
    impl RpcClient for StubRpc {
        async fn send_transaction(&self, _tx: &UnsignedTransaction, _options: SendOptions) -> Result<TransactionSubmission, EngineError> {
            Ok(TransactionSubmission {
                success: true,
                signature: Some("sig".to_string()),
                status: "confirmed".to_string(),
                gas_used: Some(5000),
            })
        }
        async fn get_latest_blockhash(&self) -> Result<String, EngineError> {
            Ok("blockhash".to_string())
        }
        async fn simulate_transaction(&self, _tx: &UnsignedTransaction) -> Result<(), EngineError> {
            Ok(())
        }
    }

    struct StubGas;
    #[async_trait]
    impl GasService for StubGas {
        async fn get_smart_priority_fee(&self, _has_recent_failures: bool) -> Result<u64, EngineError> {
            Ok(1000)
        }
        async fn get_stop_loss_max_priority_fee(&self) -> Result<u64, EngineError> {
            Ok(5000)
        }
        async fn get_emergency_priority_fee_after_timeout(&self) -> Result<u64, EngineError> {
            Ok(10000)
        }
    }

    fn executor() -> SimpleYExecutor {
        SimpleYExecutor::new(
            Arc::new(StubDlmm),
            Arc::new(StubSwap),
            Arc::new(StubRpc),
            Arc::new(StubGas),
            RetryExecutor::new(EventBus::default()),
        )
    }

    fn snapshot(active: i32, lower: i32, upper: i32) -> MarketSnapshot {
        MarketSnapshot {
            current_price: dec!(1),
            active_bin: active,
            bin_step: 10,
            position_lower_bin: lower,
            position_upper_bin: upper,
            price_history: vec![],
            price_volatility: Decimal::ZERO,
            price_drop_percentage: Decimal::ZERO,
            historical_price_changes: HistoricalPriceChanges::default(),
            current_pending_yield: Decimal::ZERO,
            total_extracted_yield: Decimal::ZERO,
            yield_rate: Decimal::ZERO,
            yield_trend: YieldTrend::Stable,
            yield_growth_rate: Decimal::ZERO,
            historical_yield_rates: HistoricalYieldRates::default(),
            benchmark_yield_rates: BenchmarkYieldRates::default(),
            net_pnl: Decimal::ZERO,
            net_pnl_percentage: Decimal::ZERO,
            position_value: dec!(1000),
            initial_investment: dec!(1000),
            holding_duration: chrono::Duration::minutes(30),
        }
    }

    #[tokio::test]
    async fn full_exit_transitions_through_cleanup_to_no_position() {
        let exec = executor();
        let mut runtime = ExecutorRuntime::new_no_position();
        runtime.stage = Stage::YPositionOnly;
        runtime.positions = vec!["pos1".to_string()];
        runtime.position_lower_bin = 0;
        runtime.position_upper_bin = 100;

        let config = ExecutorConfig::default();
        let snap = snapshot(50, 0, 100);
        let stop_loss = StopLossDecision::full_exit(vec!["breach".to_string()], Urgency::High, dec!(50));
        let recreation = RecreationDecision::no_recreate(RecreationReason::Idle, 40, "n/a");
        let cancel = CancelToken::new();

        let record = exec
            .tick(
                &mut runtime,
                &config,
                TickInputs { snapshot: &snap, stop_loss: &stop_loss, recreation: &recreation },
                &cancel,
            )
            .await;

        assert!(record.success);
        assert_eq!(runtime.stage, Stage::NoPosition);
        assert!(runtime.positions.is_empty());
    }

    #[tokio::test]
    async fn recreate_replaces_position_and_stays_in_y_position_only() {
        let exec = executor();
        let mut runtime = ExecutorRuntime::new_no_position();
        runtime.stage = Stage::OutOfRange;
        runtime.positions = vec!["pos1".to_string()];
        runtime.position_lower_bin = 0;
        runtime.position_upper_bin = 100;

        let config = ExecutorConfig::default();
        let snap = snapshot(150, 0, 100);
        let stop_loss = StopLossDecision::hold("safe", dec!(20));
        let recreation = RecreationDecision::recreate(RecreationReason::OutOfRange, 95, Urgency::Critical, "timeout");
        let cancel = CancelToken::new();

        let record = exec
            .tick(
                &mut runtime,
                &config,
                TickInputs { snapshot: &snap, stop_loss: &stop_loss, recreation: &recreation },
                &cancel,
            )
            .await;

        assert!(record.success);
        assert_eq!(runtime.stage, Stage::YPositionOnly);
        assert_eq!(runtime.positions.len(), 1);
    }

    #[tokio::test]
    async fn out_of_range_snapshot_transitions_stage_without_recreation() {
        let exec = executor();
        let mut runtime = ExecutorRuntime::new_no_position();
        runtime.stage = Stage::YPositionOnly;
        runtime.positions = vec!["pos1".to_string()];
        runtime.position_lower_bin = 0;
        runtime.position_upper_bin = 100;

        let config = ExecutorConfig::default();
        let snap = snapshot(150, 0, 100);
        let stop_loss = StopLossDecision::hold("safe", dec!(20));
        let recreation = RecreationDecision::no_recreate(RecreationReason::OutOfRange, 60, "waiting");
        let cancel = CancelToken::new();

        exec.tick(
            &mut runtime,
            &config,
            TickInputs { snapshot: &snap, stop_loss: &stop_loss, recreation: &recreation },
            &cancel,
        )
        .await;

        assert_eq!(runtime.stage, Stage::OutOfRange);
    }
}
