//! Smart Stop-Loss Module (spec §4.5).

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use dlmm_core::ids::StrategyInstanceId;
use dlmm_data::snapshot::YieldTrend;
use dlmm_data::MarketSnapshot;
use dlmm_integration::FnvIndexMap;
use rust_decimal::Decimal;

use crate::config::StopLossConfig;
use crate::decision::{StopLossAction, StopLossDecision, Urgency};

const EVAL_HISTORY_CAP: usize = 100;
const OBSERVATION_MAX_AGE: Duration = Duration::hours(1);

#[derive(Debug, Clone, Copy)]
struct ObservationEntry {
    start_time: DateTime<Utc>,
    initial_profit_percentage: Decimal,
}

/// Per-instance state for the stop-loss evaluation (spec §4.5).
#[derive(Debug, Default)]
pub struct StopLossModule {
    observations: FnvIndexMap<StrategyInstanceId, ObservationEntry>,
    history: FnvIndexMap<StrategyInstanceId, VecDeque<StopLossDecision>>,
}

impl StopLossModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate one tick for `instance`, mutating the observation registry
    /// and bounded evaluation history as a side effect.
    pub fn evaluate(
        &mut self,
        instance: &StrategyInstanceId,
        snapshot: &MarketSnapshot,
        config: &StopLossConfig,
    ) -> StopLossDecision {
        self.purge_expired_observations();

        let decision = self.evaluate_inner(instance, snapshot, config);
        self.record_history(instance, decision.clone());
        decision
    }

    fn evaluate_inner(
        &mut self,
        instance: &StrategyInstanceId,
        snapshot: &MarketSnapshot,
        config: &StopLossConfig,
    ) -> StopLossDecision {
        let position_pct = snapshot.position_percent_for_stop_loss();
        let net_pnl_pct = snapshot.net_pnl_percentage;
        let risk_score = self.risk_score(position_pct, config, snapshot);

        if position_pct > config.active_bin_safety_threshold {
            self.observations.shift_remove(instance);
            return StopLossDecision::hold(
                format!("position {position_pct}% above safety threshold {}%", config.active_bin_safety_threshold),
                risk_score,
            );
        }

        if net_pnl_pct <= -config.loss_threshold_percentage {
            self.observations.shift_remove(instance);
            return StopLossDecision::full_exit(
                vec![
                    format!("position {position_pct}% below safety threshold"),
                    format!("netPnL {net_pnl_pct}% breached -{}%", config.loss_threshold_percentage),
                ],
                Urgency::High,
                risk_score,
            );
        }

        // Unsafe zone, profitable or break-even: observation-period handling.
        let now = Utc::now();
        match self.observations.get(instance).cloned() {
            None => {
                self.observations.insert(
                    instance.clone(),
                    ObservationEntry {
                        start_time: now,
                        initial_profit_percentage: net_pnl_pct,
                    },
                );
                StopLossDecision::alert(
                    vec![format!("entered observation period at netPnL {net_pnl_pct}%")],
                    60,
                    risk_score,
                )
            }
            Some(entry) => {
                let age = now.signed_duration_since(entry.start_time);
                let window = Duration::minutes(config.observation_period_minutes);
                if age < window {
                    StopLossDecision::alert(vec!["still observing".to_string()], 60, risk_score)
                } else if net_pnl_pct >= entry.initial_profit_percentage {
                    self.observations.insert(
                        instance.clone(),
                        ObservationEntry {
                            start_time: now,
                            initial_profit_percentage: net_pnl_pct,
                        },
                    );
                    StopLossDecision::alert(
                        vec!["profit held or improved; observation window rotated".to_string()],
                        70,
                        risk_score,
                    )
                } else {
                    self.observations.shift_remove(instance);
                    StopLossDecision::full_exit(
                        vec![format!(
                            "profit degraded from {}% to {net_pnl_pct}% over observation window",
                            entry.initial_profit_percentage
                        )],
                        Urgency::Medium,
                        risk_score,
                    )
                }
            }
        }
    }

    /// `0.6*liquidityRisk + 0.2*priceRisk + 0.2*yieldRisk` (spec §4.5).
    fn risk_score(&self, position_pct: Decimal, config: &StopLossConfig, snapshot: &MarketSnapshot) -> Decimal {
        let unsafe_zone = position_pct <= config.active_bin_safety_threshold;
        let liquidity_risk = if unsafe_zone { Decimal::from(80) } else { Decimal::from(20) };

        let price_component = Decimal::from(5) * snapshot.price_drop_percentage.abs();
        let pnl_component = Decimal::from(3) * snapshot.net_pnl_percentage.abs();
        let price_risk = price_component.max(pnl_component).min(Decimal::from(100));

        let yield_risk = match snapshot.yield_trend {
            YieldTrend::Decreasing => Decimal::from(30),
            YieldTrend::Stable => Decimal::from(10),
            YieldTrend::Increasing => Decimal::ZERO,
        };

        Decimal::new(6, 1) * liquidity_risk + Decimal::new(2, 1) * price_risk + Decimal::new(2, 1) * yield_risk
    }

    fn record_history(&mut self, instance: &StrategyInstanceId, decision: StopLossDecision) {
        let log = self.history.entry(instance.clone()).or_default();
        if log.len() >= EVAL_HISTORY_CAP {
            log.pop_front();
        }
        log.push_back(decision);
    }

    fn purge_expired_observations(&mut self) {
        let now = Utc::now();
        self.observations
            .retain(|_, entry| now.signed_duration_since(entry.start_time) <= OBSERVATION_MAX_AGE);
    }

    pub fn history(&self, instance: &StrategyInstanceId) -> &[StopLossDecision] {
        self.history
            .get(instance)
            .map(|q| q.as_slices().0)
            .unwrap_or(&[])
    }

    /// Size of the observation-period registry (spec §4.8 health checker
    /// `observation_buildup` category).
    pub fn observation_count(&self) -> usize {
        self.observations.len()
    }

    /// Explicitly drop any observation older than [`OBSERVATION_MAX_AGE`],
    /// the health checker's `observation_buildup` auto-fix. `evaluate`
    /// already does this on every tick; this lets the health checker force
    /// it between ticks too.
    pub fn purge_expired(&mut self) {
        self.purge_expired_observations();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlmm_core::ids::StrategyType;
    use dlmm_data::snapshot::{BenchmarkYieldRates, HistoricalPriceChanges, HistoricalYieldRates};
    use rust_decimal_macros::dec;

    fn snapshot(position_pct_inputs: (i32, i32, i32), net_pnl_pct: Decimal) -> MarketSnapshot {
        let (active, lower, upper) = position_pct_inputs;
        MarketSnapshot {
            current_price: dec!(1),
            active_bin: active,
            bin_step: 10,
            position_lower_bin: lower,
            position_upper_bin: upper,
            price_history: vec![],
            price_volatility: Decimal::ZERO,
            price_drop_percentage: Decimal::ZERO,
            historical_price_changes: HistoricalPriceChanges::default(),
            current_pending_yield: Decimal::ZERO,
            total_extracted_yield: Decimal::ZERO,
            yield_rate: Decimal::ZERO,
            yield_trend: YieldTrend::Stable,
            yield_growth_rate: Decimal::ZERO,
            historical_yield_rates: HistoricalYieldRates::default(),
            benchmark_yield_rates: BenchmarkYieldRates::default(),
            net_pnl: Decimal::ZERO,
            net_pnl_percentage: net_pnl_pct,
            position_value: dec!(1000),
            initial_investment: dec!(1000),
            holding_duration: Duration::minutes(30),
        }
    }

    #[test]
    fn holds_when_position_above_safety_threshold() {
        let mut module = StopLossModule::new();
        let id = StrategyInstanceId::new(StrategyType::SimpleY);
        let config = StopLossConfig::default();
        let snap = snapshot((90, 0, 100), dec!(-10));
        let decision = module.evaluate(&id, &snap, &config);
        assert_eq!(decision.action, StopLossAction::Hold);
    }

    #[test]
    fn full_exits_immediately_when_loss_breaches_threshold() {
        let mut module = StopLossModule::new();
        let id = StrategyInstanceId::new(StrategyType::SimpleY);
        let config = StopLossConfig::default();
        let snap = snapshot((5, 0, 100), dec!(-10));
        let decision = module.evaluate(&id, &snap, &config);
        assert_eq!(decision.action, StopLossAction::FullExit);
        assert_eq!(decision.urgency, Urgency::High);
    }

    #[test]
    fn enters_observation_period_when_unsafe_but_profitable() {
        let mut module = StopLossModule::new();
        let id = StrategyInstanceId::new(StrategyType::SimpleY);
        let config = StopLossConfig::default();
        let snap = snapshot((5, 0, 100), dec!(2));
        let decision = module.evaluate(&id, &snap, &config);
        assert_eq!(decision.action, StopLossAction::Alert);
        assert!(module.observations.contains_key(&id));
    }

    #[test]
    fn clears_observation_when_position_recovers() {
        let mut module = StopLossModule::new();
        let id = StrategyInstanceId::new(StrategyType::SimpleY);
        let config = StopLossConfig::default();
        let unsafe_snap = snapshot((5, 0, 100), dec!(2));
        module.evaluate(&id, &unsafe_snap, &config);

        let recovered_snap = snapshot((90, 0, 100), dec!(2));
        let decision = module.evaluate(&id, &recovered_snap, &config);
        assert_eq!(decision.action, StopLossAction::Hold);
        assert!(!module.observations.contains_key(&id));
    }
}
