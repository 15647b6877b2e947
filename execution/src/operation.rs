//! Per-tick operation record (spec §4.7 step 5) and runtime held across ticks
//! for one instance.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::stage::Stage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    pub action: String,
    pub active_bin: i32,
    pub position_address: Option<String>,
    pub amount: Option<Decimal>,
    pub success: bool,
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

impl OperationRecord {
    pub fn success(action: impl Into<String>, active_bin: i32) -> Self {
        Self {
            action: action.into(),
            active_bin,
            position_address: None,
            amount: None,
            success: true,
            error: None,
            at: Utc::now(),
        }
    }

    pub fn failure(action: impl Into<String>, active_bin: i32, error: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            active_bin,
            position_address: None,
            amount: None,
            success: false,
            error: Some(error.into()),
            at: Utc::now(),
        }
    }

    pub fn with_position(mut self, address: impl Into<String>) -> Self {
        self.position_address = Some(address.into());
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }
}

/// Runtime owned exclusively by one instance's worker (spec §3 `runtime`,
/// restricted to the fields the executor itself mutates). Serializable so
/// the Scheduler can fold it into the instance's persisted snapshot
/// (spec §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorRuntime {
    pub stage: Stage,
    pub positions: Vec<String>,
    pub position_lower_bin: i32,
    pub position_upper_bin: i32,
    pub last_fee_harvest_at: Option<DateTime<Utc>>,
    pub last_recreation_at: Option<DateTime<Utc>>,
    pub execution_count: u64,
    pub error_count: u64,
}

impl ExecutorRuntime {
    pub fn new_no_position() -> Self {
        Self {
            stage: Stage::NoPosition,
            positions: Vec::new(),
            position_lower_bin: 0,
            position_upper_bin: 0,
            last_fee_harvest_at: None,
            last_recreation_at: None,
            execution_count: 0,
            error_count: 0,
        }
    }

    pub fn transition(&mut self, next: Stage) {
        debug_assert!(
            self.stage.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.stage,
            next
        );
        self.stage = next;
    }
}
