//! Synchronous-semantics retry executor with per-operation policy (spec §4.2).
//!
//! A single loop drives every retriable operation in the engine — the Data
//! Adapter's collaborator calls and every strategy Executor's on-chain calls
//! alike — rather than each call site reimplementing its own backoff. This
//! mirrors the teacher's preference for a policy table over ad-hoc retry
//! code scattered through callers.

use std::{future::Future, sync::Arc, time::Duration};

use dlmm_core::error::EngineError;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::{collection::FnvIndexMap, event_bus::EventBus};

/// Per-operation retry policy (spec §4.2 table).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retriable_substrings: Vec<&'static str>,
    /// Delay before the next attempt, indexed by the attempt number that
    /// just failed (1-based). If `attempt` exceeds the table, the last
    /// entry is reused.
    pub delays: Vec<Duration>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delays: Vec<Duration>) -> Self {
        Self {
            max_attempts,
            retriable_substrings: DEFAULT_RETRIABLE_SUBSTRINGS.to_vec(),
            delays,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let idx = (attempt as usize).saturating_sub(1).min(self.delays.len().saturating_sub(1));
        self.delays.get(idx).copied().unwrap_or_default()
    }

    pub fn is_retriable(&self, error: &EngineError) -> bool {
        if !error.category.is_retriable_category() {
            return false;
        }
        self.retriable_substrings
            .iter()
            .any(|needle| error.message.contains(needle))
    }
}

/// Substrings matched against an error's message to classify it as transient.
/// Individual policies may extend this list; every policy in
/// [`default_policy_table`] starts from it.
pub const DEFAULT_RETRIABLE_SUBSTRINGS: &[&str] = &[
    "timeout",
    "timed out",
    "connection reset",
    "network",
    "rate limit",
    "blockhash not found",
    "node is behind",
    "transaction validation timeout",
];

/// Build the policy table from spec §4.2's literal operation list.
pub fn default_policy_table() -> FnvIndexMap<&'static str, RetryPolicy> {
    let secs = |s: u64| Duration::from_secs(s);
    let mut table = FnvIndexMap::default();
    table.insert("position.create", RetryPolicy::new(2, vec![secs(2)]));
    table.insert("position.close", RetryPolicy::new(5, vec![secs(1)]));
    table.insert("liquidity.add", RetryPolicy::new(6, vec![secs(10)]));
    table.insert("token.swap", RetryPolicy::new(3, vec![secs(30)]));
    table.insert("chain.position.create", RetryPolicy::new(3, vec![secs(15)]));
    table.insert(
        "stop.loss",
        RetryPolicy::new(4, vec![secs(10), secs(30), secs(30), secs(30)]),
    );
    table.insert("stop.loss.token.swap", RetryPolicy::new(4, vec![secs(30)]));
    table.insert("position.cleanup", RetryPolicy::new(3, vec![secs(30)]));
    table.insert("outOfRange.handler", RetryPolicy::new(3, vec![secs(3)]));
    table
}

/// Cooperative cancellation signal for an in-flight retry loop (spec §5:
/// "Cancellation during a retry sleep returns immediately with the last error").
#[derive(Clone, Default)]
pub struct CancelToken {
    notify: Arc<Notify>,
    cancelled: Arc<std::sync::atomic::AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, std::sync::atomic::Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(std::sync::atomic::Ordering::SeqCst)
    }

    async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }
}

/// Executes retriable operations against [`default_policy_table`], publishing
/// `sync.retry.started|attempt|success|failed` events as it goes.
#[derive(Clone)]
pub struct RetryExecutor {
    policies: Arc<FnvIndexMap<&'static str, RetryPolicy>>,
    bus: EventBus,
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor").finish_non_exhaustive()
    }
}

impl RetryExecutor {
    pub fn new(bus: EventBus) -> Self {
        Self {
            policies: Arc::new(default_policy_table()),
            bus,
        }
    }

    fn policy(&self, operation: &str) -> RetryPolicy {
        self.policies
            .get(operation)
            .cloned()
            .unwrap_or_else(|| RetryPolicy::new(1, vec![Duration::from_secs(1)]))
    }

    /// Run `f` under `operation`'s policy. `f` receives the 1-based attempt
    /// number and must preserve the caller's decision context across calls
    /// (the loop itself holds no state beyond the attempt counter).
    pub async fn execute<F, Fut, T>(&self, operation: &str, cancel: &CancelToken, mut f: F) -> Result<T, EngineError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        self.execute_validated(operation, cancel, |v| Some(v), |_| true, &mut f).await
    }

    /// As [`Self::execute`], but a successful result must also pass `validate`
    /// or it is treated as a failure (spec §4.2).
    pub async fn execute_validated<F, Fut, T, V>(
        &self,
        operation: &str,
        cancel: &CancelToken,
        _marker: impl Fn(T) -> Option<T>,
        validate: V,
        f: &mut F,
    ) -> Result<T, EngineError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
        V: Fn(&T) -> bool,
    {
        let policy = self.policy(operation);
        self.bus
            .publish(
                "sync.retry.started",
                serde_json::json!({ "operation": operation, "maxAttempts": policy.max_attempts }),
                "retry-executor",
            )
            .await;

        let mut last_error = EngineError::system(format!("operation '{operation}' never attempted"));

        for attempt in 1..=policy.max_attempts {
            self.bus
                .publish(
                    "sync.retry.attempt",
                    serde_json::json!({ "operation": operation, "attempt": attempt }),
                    "retry-executor",
                )
                .await;

            let outcome = f(attempt).await;
            match outcome {
                Ok(value) if validate(&value) => {
                    info!(operation, attempt, "retry executor succeeded");
                    self.bus
                        .publish(
                            "sync.retry.success",
                            serde_json::json!({ "operation": operation, "attempt": attempt }),
                            "retry-executor",
                        )
                        .await;
                    return Ok(value);
                }
                Ok(_) => {
                    last_error = EngineError::execution(format!("{operation} validator rejected result"));
                }
                Err(err) => {
                    last_error = err;
                }
            }

            let retriable = policy.is_retriable(&last_error);
            if attempt == policy.max_attempts || !retriable {
                break;
            }

            let delay = policy.delay_for(attempt);
            warn!(operation, attempt, ?delay, error = %last_error, "retrying after failure");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    warn!(operation, "retry cancelled during sleep");
                    self.bus
                        .publish(
                            "sync.retry.failed",
                            serde_json::json!({ "operation": operation, "error": last_error.as_short(), "cancelled": true }),
                            "retry-executor",
                        )
                        .await;
                    return Err(last_error);
                }
            }
        }

        warn!(operation, error = %last_error, "retry executor exhausted attempts");
        self.bus
            .publish(
                "sync.retry.failed",
                serde_json::json!({ "operation": operation, "error": last_error.as_short() }),
                "retry-executor",
            )
            .await;
        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn stop_loss_schedule_retries_three_times_then_succeeds() {
        let bus = EventBus::default();
        let executor = RetryExecutor::new(bus.clone());
        let cancel = CancelToken::new();
        let calls = Arc::new(AtomicU32::new(0));

        let calls_clone = calls.clone();
        let result = executor
            .execute("stop.loss", &cancel, move |attempt| {
                let calls_clone = calls_clone.clone();
                async move {
                    calls_clone.fetch_add(1, Ordering::SeqCst);
                    if attempt < 4 {
                        Err(EngineError::execution("transaction validation timeout"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn never_exceeds_max_attempts() {
        let bus = EventBus::default();
        let executor = RetryExecutor::new(bus);
        let cancel = CancelToken::new();
        let calls = Arc::new(AtomicU32::new(0));

        let calls_clone = calls.clone();
        let result: Result<(), _> = executor
            .execute("position.create", &cancel, move |_attempt| {
                let calls_clone = calls_clone.clone();
                async move {
                    calls_clone.fetch_add(1, Ordering::SeqCst);
                    Err(EngineError::network("timeout"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_retriable_category_surfaces_immediately() {
        let bus = EventBus::default();
        let executor = RetryExecutor::new(bus);
        let cancel = CancelToken::new();
        let calls = Arc::new(AtomicU32::new(0));

        let calls_clone = calls.clone();
        let result: Result<(), _> = executor
            .execute("position.create", &cancel, move |_attempt| {
                let calls_clone = calls_clone.clone();
                async move {
                    calls_clone.fetch_add(1, Ordering::SeqCst);
                    Err(EngineError::validation("bad pool address"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_during_sleep_returns_last_error_immediately() {
        let bus = EventBus::default();
        let executor = RetryExecutor::new(bus);
        let cancel = CancelToken::new();
        let cancel_clone = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel_clone.cancel();
        });

        let result: Result<(), _> = executor
            .execute("liquidity.add", &cancel, |_attempt| async {
                Err(EngineError::network("timeout"))
            })
            .await;

        assert!(result.is_err());
    }
}
