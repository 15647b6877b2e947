//! `MarketSnapshot` and its constituent types (spec §3). A snapshot is
//! produced fresh on every tick and never persisted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YieldTrend {
    Increasing,
    Stable,
    Decreasing,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HistoricalPriceChanges {
    pub five_min: Option<Decimal>,
    pub fifteen_min: Option<Decimal>,
    pub one_hour: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YieldRateSnapshot {
    pub at: DateTime<Utc>,
    pub rate: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoricalYieldRates {
    pub five_min: Option<Decimal>,
    pub fifteen_min: Option<Decimal>,
    pub one_hour: Option<Decimal>,
    pub snapshots: Vec<YieldRateSnapshot>,
}

/// Benchmark yield averages; any field may be `None` until its warm-up
/// interval has elapsed (spec §4.4 step 6).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BenchmarkYieldRates {
    pub current_5min: Option<Decimal>,
    pub avg_5min: Option<Decimal>,
    pub avg_15min: Option<Decimal>,
    pub avg_30min: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PricePoint {
    pub at: DateTime<Utc>,
    pub price: Decimal,
}

/// Produced each tick by [`crate::adapter::DataAdapter::snapshot`]; never
/// stored long-term (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub current_price: Decimal,
    pub active_bin: i32,
    pub bin_step: u16,

    pub position_lower_bin: i32,
    pub position_upper_bin: i32,

    pub price_history: Vec<PricePoint>,
    pub price_volatility: Decimal,
    pub price_drop_percentage: Decimal,
    pub historical_price_changes: HistoricalPriceChanges,

    pub current_pending_yield: Decimal,
    pub total_extracted_yield: Decimal,
    pub yield_rate: Decimal,
    pub yield_trend: YieldTrend,
    pub yield_growth_rate: Decimal,
    pub historical_yield_rates: HistoricalYieldRates,
    pub benchmark_yield_rates: BenchmarkYieldRates,

    pub net_pnl: Decimal,
    pub net_pnl_percentage: Decimal,
    pub position_value: Decimal,
    pub initial_investment: Decimal,
    pub holding_duration: chrono::Duration,
}

impl MarketSnapshot {
    /// `position% = clamp((activeBin - lower) / (upper - lower) * 100, 0, 100)` (spec §4.5 step 1).
    ///
    /// A degenerate range (`upper == lower`) returns 0, the recreation
    /// module's boundary value; stop-loss scoring needs its own 50 default
    /// and calls [`Self::position_percent_for_stop_loss`] instead.
    pub fn position_percent(&self) -> Decimal {
        match self.raw_position_percent() {
            Some(pct) => pct,
            None => Decimal::ZERO,
        }
    }

    /// Same computation as [`Self::position_percent`], but a degenerate
    /// range returns 50 rather than 0 (spec §8 boundary behaviors: "50 for
    /// stop-loss scoring and 0 for recreation").
    pub fn position_percent_for_stop_loss(&self) -> Decimal {
        match self.raw_position_percent() {
            Some(pct) => pct,
            None => Decimal::from(50),
        }
    }

    fn raw_position_percent(&self) -> Option<Decimal> {
        let span = self.position_upper_bin - self.position_lower_bin;
        if span <= 0 {
            return None;
        }
        let raw = Decimal::from(self.active_bin - self.position_lower_bin) / Decimal::from(span)
            * Decimal::from(100);
        Some(raw.clamp(Decimal::ZERO, Decimal::from(100)))
    }

    pub fn in_range(&self) -> bool {
        self.active_bin >= self.position_lower_bin && self.active_bin <= self.position_upper_bin
    }
}
