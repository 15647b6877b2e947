//! `StrategyConfig`, the create/update payload validated on accept (spec §6).
//!
//! Follows the teacher's validate-on-construct idiom for configuration
//! (`tucano_core::system::config::InstrumentConfig`): the schema itself is a
//! plain `serde` struct, and a `StrategyConfig::validate` pass rejects a
//! malformed payload before it ever reaches a running instance.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use dlmm_core::ids::StrategyType;
use dlmm_core::validate::validate_pool_address;
use dlmm_risk::RecreationConfig;
use dlmm_risk::StopLossConfig;

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Seconds between ticks; the scheduler clamps this to a 5 s floor
    /// (spec §4.8) but validation also rejects anything below it outright.
    pub monitoring_interval_seconds: u32,
    pub out_of_range_timeout_seconds: i64,
    pub max_price_for_recreation: Option<Decimal>,
    pub min_price_for_recreation: Option<Decimal>,
    /// Percent; 0 disables the benchmark-yield alert.
    pub benchmark_yield_threshold_5min: Decimal,
    /// Percent; 0 disables the low-position alert.
    pub min_active_bin_position_threshold: Decimal,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            monitoring_interval_seconds: 15,
            out_of_range_timeout_seconds: 300,
            max_price_for_recreation: None,
            min_price_for_recreation: None,
            benchmark_yield_threshold_5min: Decimal::ZERO,
            min_active_bin_position_threshold: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YieldConfig {
    pub yield_extraction_threshold: Decimal,
    pub yield_extraction_time_lock_minutes: i64,
    pub slippage_bps: u16,
}

impl Default for YieldConfig {
    fn default() -> Self {
        Self {
            yield_extraction_threshold: Decimal::ONE,
            yield_extraction_time_lock_minutes: 1,
            slippage_bps: 100,
        }
    }
}

/// Full strategy configuration schema (spec §6 "Strategy configuration
/// (create/update payload)"). `stop_loss` and `recreation` reuse the decision
/// modules' own config types verbatim rather than duplicating their fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub strategy_type: StrategyType,
    pub name: String,
    pub pool_address: String,
    pub position_amount: Decimal,
    pub monitoring: MonitoringConfig,
    pub yield_config: YieldConfig,
    pub stop_loss: StopLossConfig,
    pub recreation: RecreationConfig,
}

impl StrategyConfig {
    /// Validate bounds per spec §6. Called on every create/update, following
    /// the teacher's validate-on-construct idiom rather than trusting the
    /// caller's payload.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".to_string()));
        }
        validate_pool_address(&self.pool_address).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.position_amount <= Decimal::ZERO {
            return Err(ConfigError::Invalid("positionAmount must be positive".to_string()));
        }
        if self.monitoring.monitoring_interval_seconds < 5 {
            return Err(ConfigError::Invalid("monitoringInterval must be >= 5 seconds".to_string()));
        }
        if self.yield_config.yield_extraction_threshold <= Decimal::ZERO {
            return Err(ConfigError::Invalid("yieldExtractionThreshold must be positive".to_string()));
        }
        if !(100..=3000).contains(&self.yield_config.slippage_bps) {
            return Err(ConfigError::Invalid("slippageBps must be within 100..=3000".to_string()));
        }
        if let (Some(min), Some(max)) = (
            self.monitoring.min_price_for_recreation,
            self.monitoring.max_price_for_recreation,
        ) {
            if min >= max {
                return Err(ConfigError::Invalid(
                    "minPriceForRecreation must be less than maxPriceForRecreation".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn valid_config() -> StrategyConfig {
        StrategyConfig {
            strategy_type: StrategyType::SimpleY,
            name: "my-position".to_string(),
            pool_address: "4wBqpZM9xaSheZzJSMawUKKwhdpChKbZ5eu5ky4Vigw".to_string(),
            position_amount: dec!(1000),
            monitoring: MonitoringConfig::default(),
            yield_config: YieldConfig::default(),
            stop_loss: StopLossConfig::default(),
            recreation: RecreationConfig::default(),
        }
    }

    #[test]
    fn accepts_a_well_formed_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn rejects_short_pool_address() {
        let mut config = valid_config();
        config.pool_address = "tooshort".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_monitoring_interval_below_floor() {
        let mut config = valid_config();
        config.monitoring.monitoring_interval_seconds = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_slippage_out_of_range() {
        let mut config = valid_config();
        config.yield_config.slippage_bps = 50;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_price_guard_bounds() {
        let mut config = valid_config();
        config.monitoring.min_price_for_recreation = Some(dec!(10));
        config.monitoring.max_price_for_recreation = Some(dec!(5));
        assert!(config.validate().is_err());
    }
}
