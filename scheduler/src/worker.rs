//! Per-instance worker task (spec §4.8): one `tokio::task` per Running
//! instance, ticking at `monitoringInterval`, stopping cooperatively on
//! command.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use dlmm_core::ids::{StrategyInstanceId, StrategyType};
use dlmm_data::adapter::{DataAdapter, SnapshotRequest};
use dlmm_data::collaborators::{DlmmClient, GasService, RpcClient, SwapClient};
use dlmm_execution::{
    ChainPositionExecutor, ExecutorConfig, ExecutorRuntime, OperationRecord, SimpleYExecutor, StrategyExecutor,
    TickInputs,
};
use dlmm_integration::retry::{CancelToken, RetryExecutor};
use dlmm_integration::{EventBus, FnvIndexMap};
use dlmm_logger::{LogCategory, LogLevel, Logger};
use dlmm_risk::{RecreationModule, StopLossModule};
use dlmm_storage::Storage;
use dlmm_strategies::{InstanceMetadata, InstanceStatus, StrategyConfig, StrategyInstance};

use crate::health::WorkerHealth;
use crate::snapshot::PersistedSnapshot;

/// The collaborator contracts (spec §6) never surface a pool's bin step
/// directly; it is a fixed pool parameter a real integration would read once
/// at position creation, which this workspace does not model.
const DEFAULT_BIN_STEP: u16 = 10;

/// Tick period never drops below this floor, "to protect collaborators"
/// (spec §4.8).
const MIN_TICK_INTERVAL: Duration = Duration::from_secs(5);
/// A tick's deadline never exceeds this, regardless of `monitoringInterval`.
const MAX_TICK_DEADLINE: Duration = Duration::from_secs(45);

pub enum WorkerCommand {
    Stop,
}

pub struct WorkerHandle {
    pub cmd_tx: mpsc::Sender<WorkerCommand>,
    pub join: tokio::task::JoinHandle<ExecutorRuntime>,
}

/// Everything a worker needs for its lifetime, already validated by the
/// Manager before spawn.
pub struct WorkerContext {
    pub instance_id: StrategyInstanceId,
    pub strategy_type: StrategyType,
    pub config: StrategyConfig,
    pub runtime: ExecutorRuntime,
    pub started_at: DateTime<Utc>,
}

/// Shared, cross-instance collaborators and subsystems a worker reads from
/// or writes to every tick.
#[derive(Clone)]
pub struct WorkerDeps {
    pub dlmm: Arc<dyn DlmmClient>,
    pub swap: Arc<dyn SwapClient>,
    pub rpc: Arc<dyn RpcClient>,
    pub gas: Arc<dyn GasService>,
    pub data_adapter: Arc<DataAdapter>,
    pub stop_loss: Arc<Mutex<StopLossModule>>,
    pub recreation: Arc<Mutex<RecreationModule>>,
    pub retry: RetryExecutor,
    pub bus: EventBus,
    pub logger: Logger,
    pub storage: Storage,
    pub health: Arc<Mutex<FnvIndexMap<StrategyInstanceId, WorkerHealth>>>,
}

fn executor_config_from(config: &StrategyConfig) -> ExecutorConfig {
    ExecutorConfig {
        pool_address: config.pool_address.clone(),
        position_amount: config.position_amount,
        slippage_bps: config.yield_config.slippage_bps,
        yield_extraction_threshold: config.yield_config.yield_extraction_threshold,
        yield_extraction_time_lock_minutes: config.yield_config.yield_extraction_time_lock_minutes,
        min_recreation_interval_minutes: config.recreation.min_recreation_interval_minutes,
        max_recreation_cost_percentage: config.recreation.max_recreation_cost_percentage,
    }
}

fn build_executor(strategy_type: StrategyType, deps: &WorkerDeps) -> Box<dyn StrategyExecutor> {
    match strategy_type {
        StrategyType::SimpleY => Box::new(SimpleYExecutor::new(
            deps.dlmm.clone(),
            deps.swap.clone(),
            deps.rpc.clone(),
            deps.gas.clone(),
            deps.retry.clone(),
        )),
        StrategyType::ChainPosition => Box::new(ChainPositionExecutor::new(
            deps.dlmm.clone(),
            deps.swap.clone(),
            deps.rpc.clone(),
            deps.gas.clone(),
            deps.retry.clone(),
        )),
    }
}

/// Spawn the per-instance worker task. Returns a handle the Manager uses to
/// request a stop; the task itself resolves to the final `ExecutorRuntime`
/// so the caller can persist it one last time.
pub fn spawn_worker(ctx: WorkerContext, deps: WorkerDeps) -> WorkerHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(1);
    let join = tokio::spawn(run_worker(ctx, deps, cmd_rx));
    WorkerHandle { cmd_tx, join }
}

async fn run_worker(mut ctx: WorkerContext, deps: WorkerDeps, mut cmd_rx: mpsc::Receiver<WorkerCommand>) -> ExecutorRuntime {
    let executor = build_executor(ctx.strategy_type, &deps);
    let executor_config = executor_config_from(&ctx.config);
    let interval = Duration::from_secs(ctx.config.monitoring.monitoring_interval_seconds as u64).max(MIN_TICK_INTERVAL);
    let deadline = interval.min(MAX_TICK_DEADLINE);
    let cancel = CancelToken::new();
    let mut last_error: Option<String> = None;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(WorkerCommand::Stop) | None => break,
                }
            }
        }

        let tick_started = Instant::now();
        let request = SnapshotRequest {
            instance_id: ctx.instance_id.clone(),
            pool_address: ctx.config.pool_address.clone(),
            bin_step: DEFAULT_BIN_STEP,
            position_lower_bin: ctx.runtime.position_lower_bin,
            position_upper_bin: ctx.runtime.position_upper_bin,
            initial_investment: ctx.config.position_amount,
            started_at: ctx.started_at,
        };

        // Disjoint field borrows: `&ctx.config` and `&mut ctx.runtime` can be
        // taken together because both project straight off `ctx`, not
        // through an intermediate `&WorkerContext`.
        let outcome = tokio::time::timeout(
            deadline,
            run_one_tick(
                &request,
                &ctx.config,
                &mut ctx.runtime,
                &executor_config,
                executor.as_ref(),
                &deps,
                &cancel,
            ),
        )
        .await;

        let elapsed = tick_started.elapsed();
        let overran = elapsed > deadline;

        match outcome {
            Ok(record) => {
                if !record.success {
                    last_error = record.error.clone();
                }
                log_record(&ctx.instance_id, &deps, &record);
            }
            Err(_) => {
                ctx.runtime.error_count += 1;
                let message = format!("tick exceeded its {:?} deadline", deadline);
                warn!(instance = %ctx.instance_id, ?deadline, "tick deadline exceeded");
                deps.logger.log(
                    LogCategory::InstanceOperations(ctx.instance_id.as_str().to_string()),
                    LogLevel::Warn,
                    message.clone(),
                    Some(ctx.instance_id.as_str().to_string()),
                    None,
                );
                last_error = Some(message);
            }
        }

        report_health(&ctx, &deps, elapsed, deadline, overran).await;
        persist(&ctx, &deps, InstanceStatus::Running, last_error.clone()).await;

        if matches!(cmd_rx.try_recv(), Ok(WorkerCommand::Stop)) {
            break;
        }
    }

    info!(instance = %ctx.instance_id, "worker exiting");
    ctx.runtime
}

/// Snapshot the market, run both decision modules, and hand the result to
/// the strategy executor. Mutates `runtime` in place (spec §4.7 steps 1-5).
async fn run_one_tick(
    request: &SnapshotRequest,
    config: &StrategyConfig,
    runtime: &mut ExecutorRuntime,
    executor_config: &ExecutorConfig,
    executor: &dyn StrategyExecutor,
    deps: &WorkerDeps,
    cancel: &CancelToken,
) -> OperationRecord {
    let snapshot = match deps.data_adapter.snapshot(request, cancel).await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!(instance = %request.instance_id, error = %err, "data adapter failed, skipping tick");
            return OperationRecord::failure("tick.snapshot", runtime.position_upper_bin, err.to_string());
        }
    };

    let stop_loss_decision = {
        let mut module = deps.stop_loss.lock().await;
        module.evaluate(&request.instance_id, &snapshot, &config.stop_loss)
    };
    let recreation_decision = {
        let mut module = deps.recreation.lock().await;
        module.evaluate(&request.instance_id, &snapshot, &config.recreation)
    };

    if !matches!(stop_loss_decision.action, dlmm_risk::StopLossAction::Hold) {
        deps.bus
            .publish(
                "strategy.smart-stop-loss.update",
                serde_json::json!({
                    "instanceId": request.instance_id.as_str(),
                    "action": format!("{:?}", stop_loss_decision.action),
                    "riskScore": stop_loss_decision.risk_score.to_string(),
                }),
                "scheduler",
            )
            .await;
    }

    let inputs = TickInputs {
        snapshot: &snapshot,
        stop_loss: &stop_loss_decision,
        recreation: &recreation_decision,
    };

    executor.tick(runtime, executor_config, inputs, cancel).await
}

fn log_record(instance_id: &StrategyInstanceId, deps: &WorkerDeps, record: &OperationRecord) {
    let instance_id = instance_id.as_str().to_string();
    let level = if record.success { LogLevel::Info } else { LogLevel::Error };
    deps.logger.log(
        LogCategory::InstanceOperations(instance_id.clone()),
        level,
        format!("{}: success={}", record.action, record.success),
        Some(instance_id),
        Some(serde_json::to_value(record).unwrap_or_default()),
    );
}

async fn report_health(ctx: &WorkerContext, deps: &WorkerDeps, elapsed: Duration, deadline: Duration, overran: bool) {
    let mut health = deps.health.lock().await;
    let entry = health.entry(ctx.instance_id.clone()).or_insert_with(|| WorkerHealth {
        last_tick_started_at: Utc::now(),
        last_tick_elapsed: elapsed,
        tick_deadline: deadline,
        consecutive_deadline_overruns: 0,
        position_count: ctx.runtime.positions.len(),
        stage_label: format!("{:?}", ctx.runtime.stage),
    });
    entry.last_tick_started_at = Utc::now();
    entry.last_tick_elapsed = elapsed;
    entry.tick_deadline = deadline;
    entry.position_count = ctx.runtime.positions.len();
    entry.stage_label = format!("{:?}", ctx.runtime.stage);
    entry.consecutive_deadline_overruns = if overran { entry.consecutive_deadline_overruns + 1 } else { 0 };
}

async fn persist(ctx: &WorkerContext, deps: &WorkerDeps, status: InstanceStatus, last_error: Option<String>) {
    let snapshot = PersistedSnapshot {
        instance: StrategyInstance {
            id: ctx.instance_id.clone(),
            strategy_type: ctx.strategy_type,
            status,
            config: ctx.config.clone(),
            metadata: InstanceMetadata {
                created_at: ctx.started_at,
                started_at: Some(ctx.started_at),
                last_update: Some(Utc::now()),
                execution_count: ctx.runtime.execution_count,
                error_count: ctx.runtime.error_count,
                last_error,
            },
        },
        runtime: ctx.runtime.clone(),
    };
    if let Err(err) = deps.storage.save(ctx.instance_id.as_str(), &snapshot).await {
        warn!(instance = %ctx.instance_id, error = %err, "failed to persist snapshot");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn executor_config_carries_pool_and_yield_settings() {
        let config = StrategyConfig {
            strategy_type: StrategyType::SimpleY,
            name: "t".to_string(),
            pool_address: "pool".to_string(),
            position_amount: dec!(1000),
            monitoring: dlmm_strategies::MonitoringConfig::default(),
            yield_config: dlmm_strategies::YieldConfig::default(),
            stop_loss: dlmm_risk::StopLossConfig::default(),
            recreation: dlmm_risk::RecreationConfig::default(),
        };
        let executor_config = executor_config_from(&config);
        assert_eq!(executor_config.pool_address, "pool");
        assert_eq!(executor_config.slippage_bps, 100);
    }
}
