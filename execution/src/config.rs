//! Executor-relevant slice of `StrategyConfig` (spec §6).

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub pool_address: String,
    pub position_amount: Decimal,
    pub slippage_bps: u16,
    pub yield_extraction_threshold: Decimal,
    pub yield_extraction_time_lock_minutes: i64,
    pub min_recreation_interval_minutes: i64,
    pub max_recreation_cost_percentage: Decimal,
}

impl ExecutorConfig {
    pub fn yield_extraction_time_lock(&self) -> Duration {
        Duration::minutes(self.yield_extraction_time_lock_minutes)
    }

    pub fn min_recreation_interval(&self) -> Duration {
        Duration::minutes(self.min_recreation_interval_minutes)
    }

    /// A close-and-create recreation pays slippage on both legs; estimate
    /// its cost as twice the configured slippage, percent of notional
    /// (spec §4.6 final paragraph "maximum recreation cost").
    pub fn estimated_recreation_cost_percentage(&self) -> Decimal {
        Decimal::from(self.slippage_bps) / Decimal::from(100) * Decimal::from(2)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            pool_address: String::new(),
            position_amount: Decimal::ZERO,
            slippage_bps: 100,
            yield_extraction_threshold: Decimal::ONE,
            yield_extraction_time_lock_minutes: 1,
            min_recreation_interval_minutes: 10,
            max_recreation_cost_percentage: Decimal::from(5),
        }
    }
}
