//! Bounded, time-windowed ring of yield-rate samples — the yield
//! counterpart to [`crate::price_ring::PriceRing`] (spec §4.4 step 6;
//! §4.5 yieldRisk trend/growth).

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::snapshot::{HistoricalYieldRates, YieldRateSnapshot, YieldTrend};

pub const DEFAULT_WINDOW: Duration = Duration::hours(1);

/// Most-recent samples retained in [`HistoricalYieldRates::snapshots`].
const SNAPSHOT_CAP: usize = 20;

/// Growth magnitude beyond which the trend leaves "stable" (spec §4.5:
/// yieldRisk's decreasing/stable/increasing buckets).
const TREND_BAND_PERCENT: i64 = 5;

#[derive(Debug, Clone)]
pub struct YieldRing {
    points: VecDeque<YieldRateSnapshot>,
    window: Duration,
}

impl Default for YieldRing {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl YieldRing {
    pub fn new(window: Duration) -> Self {
        Self {
            points: VecDeque::new(),
            window,
        }
    }

    /// Append `rate` at `at` and evict samples older than the window.
    pub fn push(&mut self, at: DateTime<Utc>, rate: Decimal) {
        self.points.push_back(YieldRateSnapshot { at, rate });
        let cutoff = at - self.window;
        while self.points.front().is_some_and(|p| p.at < cutoff) {
            self.points.pop_front();
        }
    }

    /// Percentage change from the first sample at or after `at - lookback`
    /// to the latest sample (mirrors `PriceRing::change_over`).
    pub fn change_over(&self, at: DateTime<Utc>, lookback: Duration) -> Option<Decimal> {
        let cutoff = at - lookback;
        let baseline = self.points.iter().find(|p| p.at >= cutoff)?;
        let current = self.points.back()?;
        if baseline.rate.is_zero() {
            return None;
        }
        Some((current.rate - baseline.rate) / baseline.rate * Decimal::from(100))
    }

    /// `yieldGrowthRate`: change in yield rate over the most recent 5
    /// minutes; 0 until enough history has accumulated.
    pub fn growth_rate(&self, at: DateTime<Utc>) -> Decimal {
        self.change_over(at, Duration::minutes(5)).unwrap_or(Decimal::ZERO)
    }

    /// `yieldTrend`: increasing/decreasing once the 5-minute growth rate
    /// moves past a 5% band, stable otherwise (and while history is thin).
    pub fn trend(&self, at: DateTime<Utc>) -> YieldTrend {
        match self.change_over(at, Duration::minutes(5)) {
            Some(growth) if growth >= Decimal::from(TREND_BAND_PERCENT) => YieldTrend::Increasing,
            Some(growth) if growth <= Decimal::from(-TREND_BAND_PERCENT) => YieldTrend::Decreasing,
            _ => YieldTrend::Stable,
        }
    }

    pub fn historical(&self, at: DateTime<Utc>) -> HistoricalYieldRates {
        HistoricalYieldRates {
            five_min: self.change_over(at, Duration::minutes(5)),
            fifteen_min: self.change_over(at, Duration::minutes(15)),
            one_hour: self.change_over(at, Duration::minutes(60)),
            snapshots: self.points.iter().rev().take(SNAPSHOT_CAP).rev().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn trend_is_stable_with_one_sample() {
        let mut ring = YieldRing::default();
        ring.push(t(0), dec!(2.5));
        assert_eq!(ring.trend(t(0)), YieldTrend::Stable);
        assert_eq!(ring.growth_rate(t(0)), Decimal::ZERO);
    }

    #[test]
    fn trend_is_increasing_when_growth_exceeds_band() {
        let mut ring = YieldRing::default();
        ring.push(t(0), dec!(2.0));
        ring.push(t(60), dec!(3.0));
        assert_eq!(ring.trend(t(60)), YieldTrend::Increasing);
    }

    #[test]
    fn trend_is_decreasing_when_growth_drops_below_band() {
        let mut ring = YieldRing::default();
        ring.push(t(0), dec!(3.0));
        ring.push(t(60), dec!(2.0));
        assert_eq!(ring.trend(t(60)), YieldTrend::Decreasing);
    }

    #[test]
    fn historical_caps_snapshots() {
        let mut ring = YieldRing::default();
        for i in 0..(SNAPSHOT_CAP + 5) {
            ring.push(t(i as i64 * 60), dec!(1));
        }
        let historical = ring.historical(t((SNAPSHOT_CAP as i64 + 4) * 60));
        assert_eq!(historical.snapshots.len(), SNAPSHOT_CAP);
    }
}
