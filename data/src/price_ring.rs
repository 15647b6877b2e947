//! Bounded, time-windowed ring of price samples (spec §4.4 steps 2-4).

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::snapshot::PricePoint;

/// Default retention window for [`PriceRing`] (spec §4.4 step 2).
pub const DEFAULT_WINDOW: Duration = Duration::minutes(60);

/// Number of most-recent samples considered by [`PriceRing::drop_percentage`].
const DROP_WINDOW_SAMPLES: usize = 10;

#[derive(Debug, Clone)]
pub struct PriceRing {
    points: VecDeque<PricePoint>,
    window: Duration,
}

impl Default for PriceRing {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl PriceRing {
    pub fn new(window: Duration) -> Self {
        Self {
            points: VecDeque::new(),
            window,
        }
    }

    /// Append `price` at `at` and evict samples older than the window.
    pub fn push(&mut self, at: DateTime<Utc>, price: Decimal) {
        self.points.push_back(PricePoint { at, price });
        let cutoff = at - self.window;
        while self.points.front().is_some_and(|p| p.at < cutoff) {
            self.points.pop_front();
        }
    }

    pub fn points(&self) -> &VecDeque<PricePoint> {
        &self.points
    }

    /// `volatility = std(prices) / mean(prices) * 100`, clamped to `[0, 100]`.
    pub fn volatility(&self) -> Decimal {
        if self.points.len() < 2 {
            return Decimal::ZERO;
        }
        let n = Decimal::from(self.points.len());
        let sum: Decimal = self.points.iter().map(|p| p.price).sum();
        let mean = sum / n;
        if mean.is_zero() {
            return Decimal::ZERO;
        }
        let variance: Decimal = self
            .points
            .iter()
            .map(|p| {
                let diff = p.price - mean;
                diff * diff
            })
            .sum::<Decimal>()
            / n;
        let std = sqrt_decimal(variance);
        (std / mean * Decimal::from(100)).clamp(Decimal::ZERO, Decimal::from(100))
    }

    /// `dropPercentage = max(0, (maxRecent - current) / maxRecent * 100)` over
    /// the most recent ten samples.
    pub fn drop_percentage(&self) -> Decimal {
        if self.points.is_empty() {
            return Decimal::ZERO;
        }
        let recent: Vec<&PricePoint> = self
            .points
            .iter()
            .rev()
            .take(DROP_WINDOW_SAMPLES)
            .collect();
        let Some(max_recent) = recent.iter().map(|p| p.price).max() else {
            return Decimal::ZERO;
        };
        if max_recent.is_zero() {
            return Decimal::ZERO;
        }
        let current = recent[0].price;
        let drop = (max_recent - current) / max_recent * Decimal::from(100);
        drop.max(Decimal::ZERO)
    }

    /// First sample at or after `at - lookback`, used as the baseline for a
    /// historical price-change percentage (spec §4.4 step 4).
    pub fn change_over(&self, at: DateTime<Utc>, lookback: Duration) -> Option<Decimal> {
        let cutoff = at - lookback;
        let baseline = self.points.iter().find(|p| p.at >= cutoff)?;
        let current = self.points.back()?;
        if baseline.price.is_zero() {
            return None;
        }
        Some((current.price - baseline.price) / baseline.price * Decimal::from(100))
    }
}

/// Decimal has no native `sqrt`; Newton's method converges in a handful of
/// iterations for the magnitudes prices take.
fn sqrt_decimal(value: Decimal) -> Decimal {
    if value <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let mut guess = value;
    for _ in 0..50 {
        let next = (guess + value / guess) / Decimal::from(2);
        if (next - guess).abs() < Decimal::new(1, 9) {
            return next;
        }
        guess = next;
    }
    guess
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn evicts_samples_outside_the_window() {
        let mut ring = PriceRing::new(Duration::minutes(10));
        ring.push(t(0), dec!(100));
        ring.push(t(60 * 20), dec!(110));
        assert_eq!(ring.points().len(), 1);
    }

    #[test]
    fn volatility_is_zero_for_constant_prices() {
        let mut ring = PriceRing::default();
        for i in 0..5 {
            ring.push(t(i * 60), dec!(100));
        }
        assert_eq!(ring.volatility(), Decimal::ZERO);
    }

    #[test]
    fn drop_percentage_measures_decline_from_recent_high() {
        let mut ring = PriceRing::default();
        ring.push(t(0), dec!(100));
        ring.push(t(60), dec!(90));
        assert_eq!(ring.drop_percentage(), dec!(10));
    }

    #[test]
    fn change_over_uses_first_sample_at_or_after_cutoff() {
        let mut ring = PriceRing::default();
        ring.push(t(0), dec!(100));
        ring.push(t(5 * 60), dec!(105));
        ring.push(t(10 * 60), dec!(110));
        let change = ring.change_over(t(10 * 60), Duration::minutes(5)).unwrap();
        assert_eq!(change, dec!(4.761904761904761904761904762));
    }
}
