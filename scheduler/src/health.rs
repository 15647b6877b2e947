//! Health checker (spec §4.8): runs every `checkInterval` and evaluates
//! every tracked instance against five categories, auto-fixing the ones the
//! spec gives an explicit fix for.

use std::time::Duration;

use dlmm_core::ids::StrategyInstanceId;
use serde::{Deserialize, Serialize};

/// Per-instance health signal a worker publishes after every tick (spec
/// §4.8's bounds are evaluated against these, not raw process metrics —
/// this workspace has no OS-level memory/timer instrumentation to read, so
/// `memory_leak`/`timer_leak` are approximated from data the worker already
/// has).
#[derive(Debug, Clone)]
pub struct WorkerHealth {
    pub last_tick_started_at: chrono::DateTime<chrono::Utc>,
    pub last_tick_elapsed: Duration,
    pub tick_deadline: Duration,
    pub consecutive_deadline_overruns: u32,
    pub position_count: usize,
    pub stage_label: String,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum HealthCategory {
    StuckStopping,
    TimerLeak,
    MemoryLeak,
    ObservationBuildup,
    PhaseError,
}

#[derive(Debug, Clone)]
pub struct HealthIssue {
    /// `None` for checks that evaluate shared state rather than one instance
    /// (e.g. `ObservationBuildup` against the shared risk-module registries).
    pub instance: Option<StrategyInstanceId>,
    pub category: HealthCategory,
    pub detail: String,
    pub auto_fixed: bool,
}

/// Bounds the health checker evaluates against (spec §4.8 defaults).
#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    pub check_interval: Duration,
    pub stopping_timeout: Duration,
    pub max_consecutive_deadline_overruns: u32,
    pub max_positions_per_instance: usize,
    pub max_observation_registry_size: usize,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
            stopping_timeout: Duration::from_secs(5 * 60),
            max_consecutive_deadline_overruns: 3,
            max_positions_per_instance: 2,
            max_observation_registry_size: 500,
        }
    }
}
