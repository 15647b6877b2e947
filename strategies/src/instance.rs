//! `StrategyInstance` (spec §3): the persisted, user-visible record for one
//! running strategy. The mutable pieces a worker touches every tick
//! (`stage`, `positions`, out-of-range tracking) live in
//! `dlmm_execution::ExecutorRuntime` instead — this type is the envelope the
//! Scheduler/Manager and Storage layers deal in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dlmm_core::ids::{StrategyInstanceId, StrategyType};

use crate::config::StrategyConfig;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum InstanceStatus {
    Created,
    Initializing,
    Running,
    Paused,
    Stopping,
    Stopped,
    Error,
    Completed,
}

impl InstanceStatus {
    /// Monotone status edges (spec §3, §4.7). `Stopping` may also resolve to
    /// `Error` if the health checker forces cleanup past its deadline.
    pub fn can_transition_to(self, next: InstanceStatus) -> bool {
        use InstanceStatus::*;
        matches!(
            (self, next),
            (Created, Initializing)
                | (Initializing, Running)
                | (Initializing, Error)
                | (Running, Paused)
                | (Paused, Running)
                | (Running, Stopping)
                | (Paused, Stopping)
                | (Stopping, Stopped)
                | (Stopping, Error)
                | (Running, Error)
                | (Running, Completed)
                | (_, Error)
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceMetadata {
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_update: Option<DateTime<Utc>>,
    pub execution_count: u64,
    pub error_count: u64,
    pub last_error: Option<String>,
}

/// The record the Manager owns (spec §3 "Manager exclusively owns the
/// instance table"). `config` is immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInstance {
    pub id: StrategyInstanceId,
    pub strategy_type: StrategyType,
    pub status: InstanceStatus,
    pub config: StrategyConfig,
    pub metadata: InstanceMetadata,
}

impl StrategyInstance {
    pub fn new(strategy_type: StrategyType, config: StrategyConfig) -> Self {
        Self {
            id: StrategyInstanceId::new(strategy_type),
            strategy_type,
            status: InstanceStatus::Created,
            config,
            metadata: InstanceMetadata {
                created_at: Utc::now(),
                ..Default::default()
            },
        }
    }

    /// Applies a status transition, rejecting anything not in
    /// `InstanceStatus::can_transition_to`'s edge list. Mirrors
    /// `dlmm_execution::ExecutorRuntime::transition`'s debug-assert shape,
    /// but returns an error here: status transitions cross the Manager/API
    /// boundary and must not panic on a bad request.
    pub fn transition(&mut self, next: InstanceStatus) -> Result<(), crate::error::ConfigError> {
        if !self.status.can_transition_to(next) {
            return Err(crate::error::ConfigError::Invalid(format!(
                "illegal status transition {:?} -> {:?}",
                self.status, next
            )));
        }
        self.status = next;
        self.metadata.last_update = Some(Utc::now());
        if next == InstanceStatus::Running && self.metadata.started_at.is_none() {
            self.metadata.started_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MonitoringConfig, YieldConfig};
    use dlmm_risk::{RecreationConfig, StopLossConfig};
    use rust_decimal_macros::dec;

    fn config() -> StrategyConfig {
        StrategyConfig {
            strategy_type: StrategyType::SimpleY,
            name: "instance-under-test".to_string(),
            pool_address: "4wBqpZM9xaSheZzJSMawUKKwhdpChKbZ5eu5ky4Vigw".to_string(),
            position_amount: dec!(1000),
            monitoring: MonitoringConfig::default(),
            yield_config: YieldConfig::default(),
            stop_loss: StopLossConfig::default(),
            recreation: RecreationConfig::default(),
        }
    }

    #[test]
    fn new_instance_starts_created_with_id_prefix() {
        let instance = StrategyInstance::new(StrategyType::SimpleY, config());
        assert_eq!(instance.status, InstanceStatus::Created);
        assert!(instance.id.as_str().starts_with("simple_y_"));
    }

    #[test]
    fn lifecycle_walks_through_legal_edges() {
        let mut instance = StrategyInstance::new(StrategyType::SimpleY, config());
        instance.transition(InstanceStatus::Initializing).unwrap();
        instance.transition(InstanceStatus::Running).unwrap();
        assert!(instance.metadata.started_at.is_some());
        instance.transition(InstanceStatus::Stopping).unwrap();
        instance.transition(InstanceStatus::Stopped).unwrap();
    }

    #[test]
    fn skipping_initializing_is_rejected() {
        let mut instance = StrategyInstance::new(StrategyType::SimpleY, config());
        assert!(instance.transition(InstanceStatus::Running).is_err());
    }

    #[test]
    fn any_state_can_transition_to_error() {
        let mut instance = StrategyInstance::new(StrategyType::SimpleY, config());
        instance.transition(InstanceStatus::Initializing).unwrap();
        assert!(instance.transition(InstanceStatus::Error).is_ok());
    }
}
