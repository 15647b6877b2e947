//! The Manager (spec §3, §4.8): owns the instance table exclusively, spawns
//! and stops per-instance workers, runs the health checker, and persists/
//! recovers instance snapshots across restarts.

use std::sync::Arc;

use dlmm_core::error::EngineError;
use dlmm_core::ids::{StrategyInstanceId, StrategyType};
use dlmm_data::adapter::DataAdapter;
use dlmm_data::collaborators::{AnalyticsService, DlmmClient, GasService, RpcClient, SwapClient};
use dlmm_integration::retry::RetryExecutor;
use dlmm_integration::{EventBus, FnvIndexMap};
use dlmm_logger::Logger;
use dlmm_risk::{RecreationModule, StopLossModule};
use dlmm_storage::Storage;
use dlmm_strategies::{InstanceStatus, StrategyConfig, StrategyInstance};
use tokio::sync::Mutex;
use tokio::time::Duration;
use tracing::{info, warn};

use crate::error::SchedulerError;
use crate::health::{HealthCategory, HealthCheckConfig, HealthIssue, WorkerHealth};
use crate::snapshot::PersistedSnapshot;
use crate::worker::{spawn_worker, WorkerCommand, WorkerContext, WorkerDeps, WorkerHandle};

/// `strategy.smart-stop-loss.update` is coalesced on the bus (spec §4.1
/// default debounce, §4.8 "multiple stop-loss updates in a short window
/// collapse into one").
const STOP_LOSS_UPDATE_DEBOUNCE: Duration = Duration::from_secs(1);

pub struct Manager {
    instances: Arc<Mutex<FnvIndexMap<StrategyInstanceId, StrategyInstance>>>,
    workers: Arc<Mutex<FnvIndexMap<StrategyInstanceId, WorkerHandle>>>,
    deps: WorkerDeps,
    health_config: HealthCheckConfig,
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager").finish_non_exhaustive()
    }
}

impl Manager {
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        dlmm: Arc<dyn DlmmClient>,
        swap: Arc<dyn SwapClient>,
        rpc: Arc<dyn RpcClient>,
        gas: Arc<dyn GasService>,
        analytics: Arc<dyn AnalyticsService>,
        retry: RetryExecutor,
        bus: EventBus,
        logger: Logger,
        storage: Storage,
        health_config: HealthCheckConfig,
    ) -> Self {
        bus.set_debounced("strategy.smart-stop-loss.update", STOP_LOSS_UPDATE_DEBOUNCE).await;

        let data_adapter = Arc::new(DataAdapter::new(dlmm.clone(), analytics, retry.clone()));
        let deps = WorkerDeps {
            dlmm,
            swap,
            rpc,
            gas,
            data_adapter,
            stop_loss: Arc::new(Mutex::new(StopLossModule::new())),
            recreation: Arc::new(Mutex::new(RecreationModule::new())),
            retry,
            bus,
            logger,
            storage,
            health: Arc::new(Mutex::new(FnvIndexMap::default())),
        };

        Self {
            instances: Arc::new(Mutex::new(FnvIndexMap::default())),
            workers: Arc::new(Mutex::new(FnvIndexMap::default())),
            deps,
            health_config,
        }
    }

    /// Validate and accept a new strategy configuration, spawning its worker
    /// once the instance transitions to `Running` (spec §4.8 "create a
    /// strategy instance").
    pub async fn start(&self, strategy_type: StrategyType, config: StrategyConfig) -> Result<StrategyInstanceId, SchedulerError> {
        config.validate()?;

        let mut instance = StrategyInstance::new(strategy_type, config.clone());
        let id = instance.id.clone();
        instance.transition(InstanceStatus::Initializing)?;

        {
            let mut instances = self.instances.lock().await;
            instances.insert(id.clone(), instance);
        }

        let ctx = WorkerContext {
            instance_id: id.clone(),
            strategy_type,
            config,
            runtime: dlmm_execution::ExecutorRuntime::new_no_position(),
            started_at: chrono::Utc::now(),
        };
        let handle = spawn_worker(ctx, self.deps.clone());

        {
            let mut instances = self.instances.lock().await;
            if let Some(instance) = instances.get_mut(&id) {
                instance.transition(InstanceStatus::Running)?;
            }
        }
        self.workers.lock().await.insert(id.clone(), handle);

        self.deps
            .bus
            .publish(
                "strategy.started",
                serde_json::json!({ "instanceId": id.as_str(), "strategyType": format!("{:?}", strategy_type) }),
                "manager",
            )
            .await;
        self.deps.logger.echo(format!("strategy {} started", id.as_str()), Some(id.as_str().to_string()), None);

        Ok(id)
    }

    /// Stop one instance: signal its worker, await completion up to
    /// `stopping_timeout`, then mark `Stopped` (spec §4.8 "signal worker to
    /// complete current tick then exit").
    pub async fn stop(&self, id: &StrategyInstanceId) -> Result<(), SchedulerError> {
        {
            let mut instances = self.instances.lock().await;
            let instance = instances.get_mut(id).ok_or_else(|| SchedulerError::NotFound(id.clone()))?;
            instance.transition(InstanceStatus::Stopping)?;
        }

        let handle = self.workers.lock().await.shift_remove(id);
        let mut final_runtime = None;
        if let Some(handle) = handle {
            let _ = handle.cmd_tx.send(WorkerCommand::Stop).await;
            match tokio::time::timeout(self.health_config.stopping_timeout, handle.join).await {
                Ok(Ok(runtime)) => final_runtime = Some(runtime),
                Ok(Err(err)) => warn!(%id, error = %err, "worker task panicked while stopping"),
                Err(_) => warn!(%id, "worker did not stop within the configured timeout"),
            }
        }

        let stopped_instance = {
            let mut instances = self.instances.lock().await;
            let instance = instances.get_mut(id).ok_or_else(|| SchedulerError::NotFound(id.clone()))?;
            instance.transition(InstanceStatus::Stopped)?;
            instance.clone()
        };

        // Persist the Stopped status so `recover_on_start` does not resurrect
        // a cleanly-stopped instance from a stale `Running` snapshot.
        if let Some(runtime) = final_runtime {
            let snapshot = PersistedSnapshot { instance: stopped_instance, runtime };
            if let Err(err) = self.deps.storage.save(id.as_str(), &snapshot).await {
                warn!(%id, error = %err, "failed to persist stopped snapshot");
            }
        }

        self.deps
            .bus
            .publish("strategy.stopped", serde_json::json!({ "instanceId": id.as_str() }), "manager")
            .await;

        Ok(())
    }

    pub async fn get(&self, id: &StrategyInstanceId) -> Option<StrategyInstance> {
        self.instances.lock().await.get(id).cloned()
    }

    pub async fn list(&self) -> Vec<StrategyInstance> {
        self.instances.lock().await.values().cloned().collect()
    }

    /// Reload every persisted snapshot and restart instances that were
    /// `Running` at the time of the last shutdown (spec §4.9 "on startup,
    /// reconcile the instance table against persisted snapshots").
    pub async fn recover_on_start(&self) -> Result<usize, SchedulerError> {
        let keys = self.deps.storage.list().await?;
        let mut recovered = 0;

        for key in keys {
            let snapshot: PersistedSnapshot = match self.deps.storage.load(&key).await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!(key, error = %err, "skipping unreadable snapshot during recovery");
                    continue;
                }
            };

            if snapshot.instance.status != InstanceStatus::Running {
                self.instances.lock().await.insert(snapshot.instance.id.clone(), snapshot.instance);
                continue;
            }

            let mut instance = snapshot.instance;
            let id = instance.id.clone();
            instance.status = InstanceStatus::Initializing;
            self.instances.lock().await.insert(id.clone(), instance.clone());

            let ctx = WorkerContext {
                instance_id: id.clone(),
                strategy_type: instance.strategy_type,
                config: instance.config.clone(),
                runtime: snapshot.runtime,
                started_at: instance.metadata.started_at.unwrap_or(instance.metadata.created_at),
            };
            let handle = spawn_worker(ctx, self.deps.clone());

            {
                let mut instances = self.instances.lock().await;
                if let Some(instance) = instances.get_mut(&id) {
                    instance.status = InstanceStatus::Running;
                }
            }
            self.workers.lock().await.insert(id.clone(), handle);
            recovered += 1;
            info!(%id, "recovered running instance from persisted snapshot");
        }

        Ok(recovered)
    }

    /// Run the health checker for one pass over every tracked instance
    /// (spec §4.8 five categories). Intended to be driven by a loop sleeping
    /// `health_config.check_interval` between calls.
    pub async fn run_health_check(&self) -> Vec<HealthIssue> {
        let mut issues = Vec::new();
        let instances: Vec<StrategyInstance> = self.instances.lock().await.values().cloned().collect();
        let mut health = self.deps.health.lock().await;

        for instance in &instances {
            if instance.status == InstanceStatus::Stopping {
                issues.push(self.check_stuck_stopping(instance).await);
            }
            if let Some(entry) = health.get(&instance.id) {
                issues.extend(self.check_worker_health(instance, entry).await);
            }
        }

        let stop_loss_count = self.deps.stop_loss.lock().await.observation_count();
        let recreation_count = self.deps.recreation.lock().await.state_count();
        if stop_loss_count + recreation_count > self.health_config.max_observation_registry_size {
            self.deps.stop_loss.lock().await.purge_expired();
            issues.push(HealthIssue {
                instance: None,
                category: HealthCategory::ObservationBuildup,
                detail: format!("registries hold {stop_loss_count}+{recreation_count} entries, auto-purged expired ones"),
                auto_fixed: true,
            });
        }

        issues.into_iter().filter(|i| !i.detail.is_empty()).collect()
    }

    async fn check_stuck_stopping(&self, instance: &StrategyInstance) -> HealthIssue {
        let stuck = instance
            .metadata
            .last_update
            .map(|at| chrono::Utc::now().signed_duration_since(at) > chrono::Duration::from_std(self.health_config.stopping_timeout).unwrap_or_default())
            .unwrap_or(false);
        if stuck {
            warn!(id = %instance.id, "instance stuck in Stopping past its timeout; forcing Stopped");
            if let Some(live) = self.instances.lock().await.get_mut(&instance.id) {
                live.status = InstanceStatus::Stopped;
            }
            if let Some(handle) = self.workers.lock().await.shift_remove(&instance.id) {
                let _ = handle.cmd_tx.send(WorkerCommand::Stop).await;
                handle.join.abort();
            }
            HealthIssue {
                instance: Some(instance.id.clone()),
                category: HealthCategory::StuckStopping,
                detail: "force-stopped after exceeding the stopping timeout".to_string(),
                auto_fixed: true,
            }
        } else {
            HealthIssue {
                instance: Some(instance.id.clone()),
                category: HealthCategory::StuckStopping,
                detail: String::new(),
                auto_fixed: false,
            }
        }
    }

    /// Force-stop and respawn an instance's worker with its last-known
    /// runtime, the `timer_leak` auto-fix (spec §4.8 "fix by worker
    /// restart").
    async fn restart_worker(&self, instance: &StrategyInstance) -> bool {
        let Some(handle) = self.workers.lock().await.shift_remove(&instance.id) else {
            return false;
        };
        let _ = handle.cmd_tx.send(WorkerCommand::Stop).await;
        let runtime = match tokio::time::timeout(self.health_config.stopping_timeout, handle.join).await {
            Ok(Ok(runtime)) => runtime,
            Ok(Err(err)) => {
                warn!(id = %instance.id, error = %err, "worker task panicked during restart");
                dlmm_execution::ExecutorRuntime::new_no_position()
            }
            Err(_) => {
                warn!(id = %instance.id, "worker did not stop within timeout during restart; respawning anyway");
                dlmm_execution::ExecutorRuntime::new_no_position()
            }
        };

        let ctx = WorkerContext {
            instance_id: instance.id.clone(),
            strategy_type: instance.strategy_type,
            config: instance.config.clone(),
            runtime,
            started_at: instance.metadata.started_at.unwrap_or(instance.metadata.created_at),
        };
        let handle = spawn_worker(ctx, self.deps.clone());
        self.workers.lock().await.insert(instance.id.clone(), handle);
        true
    }

    async fn check_worker_health(&self, instance: &StrategyInstance, entry: &WorkerHealth) -> Vec<HealthIssue> {
        let mut out = Vec::new();
        if entry.consecutive_deadline_overruns >= self.health_config.max_consecutive_deadline_overruns {
            warn!(id = %instance.id, "timer leak detected; restarting worker");
            let restarted = self.restart_worker(instance).await;
            out.push(HealthIssue {
                instance: Some(instance.id.clone()),
                category: HealthCategory::TimerLeak,
                detail: format!(
                    "{} consecutive tick-deadline overruns, worker restarted",
                    entry.consecutive_deadline_overruns
                ),
                auto_fixed: restarted,
            });
        }
        if entry.position_count > self.health_config.max_positions_per_instance {
            out.push(HealthIssue {
                instance: Some(instance.id.clone()),
                category: HealthCategory::MemoryLeak,
                detail: format!("{} open positions exceeds the expected bound", entry.position_count),
                auto_fixed: false,
            });
        }
        let expected_positions = match instance.strategy_type {
            StrategyType::SimpleY => 1,
            StrategyType::ChainPosition => 2,
        };
        if entry.stage_label != "NoPosition" && entry.stage_label != "Cleanup" && entry.position_count != expected_positions {
            out.push(HealthIssue {
                instance: Some(instance.id.clone()),
                category: HealthCategory::PhaseError,
                detail: format!("stage {} but {} positions open (expected {expected_positions})", entry.stage_label, entry.position_count),
                auto_fixed: false,
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dlmm_data::collaborators::{
        CreatePositionParams, ExecuteSwapParams, PnlReport, PoolPriceAndBin, SendOptions, SwapOutcome, SwapQuote,
        TransactionSubmission, UnsignedTransaction, YieldStats,
    };
    use dlmm_logger::LogLevel as _LogLevel;
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
        async fn create_position_transaction(&self, _params: CreatePositionParams) -> Result<UnsignedTransaction, EngineError> {
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
            Ok(SwapOutcome { signature: "s".to_string(), amount_in: dec!(1), amount_out: dec!(1), price_impact_bps: 0 })
        }
    }

    struct StubRpc;
    #[async_trait]
    impl RpcClient for StubRpc {
        async fn send_transaction(&self, _tx: &UnsignedTransaction, _options: SendOptions) -> Result<TransactionSubmission, EngineError> {
            Ok(TransactionSubmission { success: true, signature: Some("s".to_string()), status: "confirmed".to_string(), gas_used: Some(1) })
        }
        async fn get_latest_blockhash(&self) -> Result<String, EngineError> {
            Ok("bh".to_string())
        }
        async fn simulate_transaction(&self, _tx: &UnsignedTransaction) -> Result<(), EngineError> {
            Ok(())
        }
    }

    struct StubGas;
    #[async_trait]
    impl GasService for StubGas {
        async fn get_smart_priority_fee(&self, _has_recent_failures: bool) -> Result<u64, EngineError> {
            Ok(1)
        }
        async fn get_stop_loss_max_priority_fee(&self) -> Result<u64, EngineError> {
            Ok(1)
        }
        async fn get_emergency_priority_fee_after_timeout(&self) -> Result<u64, EngineError> {
            Ok(1)
        }
    }

    struct StubAnalytics;
    #[async_trait]
    impl AnalyticsService for StubAnalytics {
        async fn yield_stats(&self, _instance_id: &str) -> Result<YieldStats, EngineError> {
            Ok(YieldStats::default())
        }
        async fn pnl_report(&self, _instance_id: &str) -> Result<PnlReport, EngineError> {
            Ok(PnlReport { position_value: dec!(1000) })
        }
    }

    async fn manager(storage_dir: &std::path::Path) -> Manager {
        let (logger, _handle) = Logger::new(storage_dir.join("logs"), _LogLevel::Info);
        let storage = Storage::open(storage_dir.join("state")).await.unwrap();
        Manager::new(
            Arc::new(StubDlmm),
            Arc::new(StubSwap),
            Arc::new(StubRpc),
            Arc::new(StubGas),
            Arc::new(StubAnalytics),
            RetryExecutor::new(EventBus::default()),
            EventBus::default(),
            logger,
            storage,
            HealthCheckConfig::default(),
        )
        .await
    }

    fn config() -> StrategyConfig {
        StrategyConfig {
            strategy_type: StrategyType::SimpleY,
            name: "test".to_string(),
            pool_address: "4wBqpZM9xaSheZzJSMawUKKwhdpChKbZ5eu5ky4Vigw".to_string(),
            position_amount: dec!(1000),
            monitoring: dlmm_strategies::MonitoringConfig { monitoring_interval_seconds: 5, ..Default::default() },
            yield_config: dlmm_strategies::YieldConfig::default(),
            stop_loss: dlmm_risk::StopLossConfig::default(),
            recreation: dlmm_risk::RecreationConfig::default(),
        }
    }

    #[tokio::test]
    async fn start_then_stop_walks_through_the_lifecycle() {
        let dir = std::env::temp_dir().join(format!("dlmm-manager-test-{}", uuid::Uuid::new_v4()));
        let manager = manager(&dir).await;

        let id = manager.start(StrategyType::SimpleY, config()).await.unwrap();
        let instance = manager.get(&id).await.unwrap();
        assert_eq!(instance.status, InstanceStatus::Running);

        manager.stop(&id).await.unwrap();
        let instance = manager.get(&id).await.unwrap();
        assert_eq!(instance.status, InstanceStatus::Stopped);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn stop_on_unknown_instance_is_not_found() {
        let dir = std::env::temp_dir().join(format!("dlmm-manager-test-{}", uuid::Uuid::new_v4()));
        let manager = manager(&dir).await;
        let bogus = StrategyInstanceId::new(StrategyType::SimpleY);
        assert!(matches!(manager.stop(&bogus).await, Err(SchedulerError::NotFound(_))));
        std::fs::remove_dir_all(&dir).ok();
    }
}
