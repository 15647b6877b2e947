//! Configuration consumed by the decision modules, a subset of the full
//! `StrategyConfig` (spec §6).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopLossConfig {
    pub enabled: bool,
    /// May be negative to disable (spec §6).
    pub active_bin_safety_threshold: Decimal,
    pub observation_period_minutes: i64,
    pub loss_threshold_percentage: Decimal,
}

impl Default for StopLossConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            active_bin_safety_threshold: Decimal::from(50),
            observation_period_minutes: 15,
            loss_threshold_percentage: Decimal::from(5),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketOpportunityConfig {
    pub enabled: bool,
    pub position_threshold: Decimal,
    pub profit_threshold: Decimal,
}

impl Default for MarketOpportunityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            position_threshold: Decimal::from(70),
            profit_threshold: Decimal::ONE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LossRecoveryConfig {
    pub enabled: bool,
    pub mark_position_threshold: Decimal,
    pub mark_loss_threshold: Decimal,
    pub trigger_position_threshold: Decimal,
    pub trigger_profit_threshold: Decimal,
}

impl Default for LossRecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mark_position_threshold: Decimal::from(65),
            mark_loss_threshold: Decimal::new(5, 1),
            trigger_position_threshold: Decimal::from(70),
            trigger_profit_threshold: Decimal::new(5, 1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicProfitConfig {
    pub enabled: bool,
    pub position_threshold: Decimal,
    pub benchmark_tier1_max: Decimal,
    pub benchmark_tier2_max: Decimal,
    pub benchmark_tier3_max: Decimal,
    pub profit_threshold_tier1: Decimal,
    pub profit_threshold_tier2: Decimal,
    pub profit_threshold_tier3: Decimal,
    pub profit_threshold_tier4: Decimal,
}

impl Default for DynamicProfitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            benchmark_tier1_max: Decimal::from(5),
            benchmark_tier2_max: Decimal::from(10),
            benchmark_tier3_max: Decimal::from(20),
            position_threshold: Decimal::from(70),
            profit_threshold_tier1: Decimal::new(5, 1),
            profit_threshold_tier2: Decimal::ONE,
            profit_threshold_tier3: Decimal::from(2),
            profit_threshold_tier4: Decimal::from(3),
        }
    }
}

impl DynamicProfitConfig {
    /// Tier selection by benchmark (spec §4.6 rule 4).
    pub fn threshold_for_benchmark(&self, benchmark: Decimal) -> Decimal {
        if benchmark <= self.benchmark_tier1_max {
            self.profit_threshold_tier1
        } else if benchmark <= self.benchmark_tier2_max {
            self.profit_threshold_tier2
        } else if benchmark <= self.benchmark_tier3_max {
            self.profit_threshold_tier3
        } else {
            self.profit_threshold_tier4
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecreationConfig {
    pub min_active_bin_position_threshold: Decimal,
    pub out_of_range_timeout_seconds: i64,
    pub enable_price_check: bool,
    pub max_price_for_recreation: Option<Decimal>,
    pub min_price_for_recreation: Option<Decimal>,
    pub market_opportunity: MarketOpportunityConfig,
    pub loss_recovery: LossRecoveryConfig,
    pub dynamic_profit: DynamicProfitConfig,
    /// Minimum time between accepted recreations, enforced by the executor
    /// rather than this module (spec §4.6 final paragraph).
    pub min_recreation_interval_minutes: i64,
    /// Maximum estimated recreation cost, percent of notional, enforced by
    /// the executor rather than this module (spec §4.6 final paragraph).
    pub max_recreation_cost_percentage: Decimal,
}

impl Default for RecreationConfig {
    fn default() -> Self {
        Self {
            min_active_bin_position_threshold: Decimal::ZERO,
            out_of_range_timeout_seconds: 300,
            enable_price_check: false,
            max_price_for_recreation: None,
            min_price_for_recreation: None,
            market_opportunity: MarketOpportunityConfig::default(),
            loss_recovery: LossRecoveryConfig::default(),
            dynamic_profit: DynamicProfitConfig::default(),
            min_recreation_interval_minutes: 10,
            max_recreation_cost_percentage: Decimal::from(5),
        }
    }
}
