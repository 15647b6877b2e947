//! Position-Recreation Module (spec §4.6).

use chrono::{DateTime, Duration, Utc};
use dlmm_core::ids::StrategyInstanceId;
use dlmm_data::MarketSnapshot;
use dlmm_integration::FnvIndexMap;
use rust_decimal::Decimal;

use crate::config::RecreationConfig;
use crate::decision::{RecreationDecision, RecreationReason, Urgency};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OutOfRangeDirection {
    Above,
    Below,
}

#[derive(Debug, Clone, Copy, Default)]
struct InstanceState {
    out_of_range_start_time: Option<DateTime<Utc>>,
    out_of_range_direction: Option<OutOfRangeDirection>,
    loss_recovery_marked: bool,
}

/// Per-instance state for recreation rule evaluation (spec §4.6).
#[derive(Debug, Default)]
pub struct RecreationModule {
    state: FnvIndexMap<StrategyInstanceId, InstanceState>,
}

impl RecreationModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicitly clear the loss-recovery mark for `instance` (spec §4.6:
    /// "reset by the executor, or instance state reset").
    pub fn reset_loss_recovery_mark(&mut self, instance: &StrategyInstanceId) {
        if let Some(state) = self.state.get_mut(instance) {
            state.loss_recovery_marked = false;
        }
    }

    pub fn reset_instance(&mut self, instance: &StrategyInstanceId) {
        self.state.shift_remove(instance);
    }

    /// Evaluate one tick for `instance`. Rules are checked in order; the
    /// first match wins (spec §4.6).
    pub fn evaluate(
        &mut self,
        instance: &StrategyInstanceId,
        snapshot: &MarketSnapshot,
        config: &RecreationConfig,
    ) -> RecreationDecision {
        let position_pct = snapshot.position_percent();
        let net_pnl_pct = snapshot.net_pnl_percentage;

        // Rule 0 — position-too-low gate.
        if config.min_active_bin_position_threshold > Decimal::ZERO
            && position_pct < config.min_active_bin_position_threshold
        {
            return RecreationDecision::no_recreate(
                RecreationReason::PositionTooLow,
                95,
                format!("position {position_pct}% below gate {}%", config.min_active_bin_position_threshold),
            );
        }

        // Rule 1 — out-of-range timeout.
        if let Some(decision) = self.evaluate_out_of_range(instance, snapshot, config, position_pct) {
            return decision;
        }

        // Rule 2 — market-opportunity recreation.
        if config.market_opportunity.enabled
            && position_pct < config.market_opportunity.position_threshold
            && net_pnl_pct > config.market_opportunity.profit_threshold
        {
            return RecreationDecision::recreate(
                RecreationReason::MarketOpportunity,
                85,
                Urgency::Medium,
                format!("position {position_pct}% < threshold and netPnL {net_pnl_pct}% profitable"),
            );
        }

        // Rule 3 — loss-recovery recreation (two-phase).
        if config.loss_recovery.enabled {
            if let Some(decision) = self.evaluate_loss_recovery(instance, snapshot, config, position_pct, net_pnl_pct) {
                return decision;
            }
        }

        // Rule 4 — dynamic-profit recreation.
        if config.dynamic_profit.enabled {
            if let Some(decision) = self.evaluate_dynamic_profit(snapshot, config, position_pct, net_pnl_pct) {
                return decision;
            }
        }

        // Rule 5 — reserved; always NoRecreate.
        self.idle_status(instance, config, position_pct)
    }

    fn evaluate_out_of_range(
        &mut self,
        instance: &StrategyInstanceId,
        snapshot: &MarketSnapshot,
        config: &RecreationConfig,
        position_pct: Decimal,
    ) -> Option<RecreationDecision> {
        let now = Utc::now();
        let state = self.state.entry(instance.clone()).or_default();

        if snapshot.in_range() {
            state.out_of_range_start_time = None;
            state.out_of_range_direction = None;
            return None;
        }

        let direction = if snapshot.active_bin > snapshot.position_upper_bin {
            OutOfRangeDirection::Above
        } else {
            OutOfRangeDirection::Below
        };

        let direction_changed = state.out_of_range_direction != Some(direction);
        if state.out_of_range_start_time.is_none() || direction_changed {
            state.out_of_range_start_time = Some(now);
            state.out_of_range_direction = Some(direction);
            return Some(RecreationDecision {
                confidence: 50,
                ..RecreationDecision::no_recreate(
                    RecreationReason::OutOfRange,
                    50,
                    format!("out-of-range timer started, direction {direction:?}"),
                )
            });
        }

        let start = state.out_of_range_start_time.expect("just ensured Some above");
        let age = now.signed_duration_since(start);
        let timeout = Duration::seconds(config.out_of_range_timeout_seconds);
        if age < timeout {
            return Some(RecreationDecision::no_recreate(
                RecreationReason::OutOfRange,
                60,
                format!("out-of-range timer at {}s of {}s", age.num_seconds(), timeout.num_seconds()),
            ));
        }

        if direction == OutOfRangeDirection::Above && config.enable_price_check {
            if let Some(max_price) = config.max_price_for_recreation {
                if snapshot.current_price > max_price {
                    state.out_of_range_start_time = None;
                    state.out_of_range_direction = None;
                    return Some(RecreationDecision::no_recreate(
                        RecreationReason::PriceCheckFailed,
                        80,
                        format!("price {} above recreation ceiling {max_price}", snapshot.current_price),
                    ));
                }
            }
        }

        let _ = position_pct;
        Some(RecreationDecision::recreate(
            RecreationReason::OutOfRange,
            95,
            Urgency::Critical,
            format!("out-of-range for {}s, exceeding timeout", age.num_seconds()),
        ))
    }

    fn evaluate_loss_recovery(
        &mut self,
        instance: &StrategyInstanceId,
        _snapshot: &MarketSnapshot,
        config: &RecreationConfig,
        position_pct: Decimal,
        net_pnl_pct: Decimal,
    ) -> Option<RecreationDecision> {
        let state = self.state.entry(instance.clone()).or_default();
        let cfg = &config.loss_recovery;

        if !state.loss_recovery_marked {
            if position_pct < cfg.mark_position_threshold && net_pnl_pct <= -cfg.mark_loss_threshold {
                state.loss_recovery_marked = true;
                return Some(RecreationDecision::no_recreate(
                    RecreationReason::LossRecovery,
                    55,
                    "loss-recovery mark set; monitoring for trigger",
                ));
            }
            return None;
        }

        if position_pct <= cfg.trigger_position_threshold && net_pnl_pct >= cfg.trigger_profit_threshold {
            state.loss_recovery_marked = false;
            return Some(RecreationDecision::recreate(
                RecreationReason::LossRecovery,
                85,
                Urgency::Critical,
                "loss-recovery trigger conditions met",
            ));
        }

        Some(RecreationDecision::no_recreate(
            RecreationReason::LossRecovery,
            55,
            "loss-recovery marked; awaiting trigger",
        ))
    }

    fn evaluate_dynamic_profit(
        &self,
        _snapshot: &MarketSnapshot,
        config: &RecreationConfig,
        position_pct: Decimal,
        net_pnl_pct: Decimal,
    ) -> Option<RecreationDecision> {
        let benchmark = _snapshot_benchmark(_snapshot)?;
        if benchmark <= Decimal::ZERO {
            return None;
        }
        let threshold = config.dynamic_profit.threshold_for_benchmark(benchmark);
        if position_pct <= config.dynamic_profit.position_threshold && net_pnl_pct >= threshold {
            return Some(RecreationDecision::recreate(
                RecreationReason::DynamicProfit,
                85,
                Urgency::Medium,
                format!("benchmark {benchmark}% selected threshold {threshold}%, netPnL {net_pnl_pct}%"),
            ));
        }
        None
    }

    fn idle_status(
        &self,
        instance: &StrategyInstanceId,
        _config: &RecreationConfig,
        position_pct: Decimal,
    ) -> RecreationDecision {
        if let Some(state) = self.state.get(instance) {
            if let Some(start) = state.out_of_range_start_time {
                let age = Utc::now().signed_duration_since(start);
                return RecreationDecision::no_recreate(
                    RecreationReason::OutOfRange,
                    60,
                    format!("out-of-range countdown at {}s", age.num_seconds()),
                );
            }
            if state.loss_recovery_marked {
                return RecreationDecision::no_recreate(
                    RecreationReason::LossRecovery,
                    55,
                    "loss-recovery marked; awaiting trigger",
                );
            }
        }
        RecreationDecision::no_recreate(RecreationReason::Idle, 40, format!("idle, position {position_pct}%"))
    }

    /// Size of the per-instance state registry (spec §4.8 health checker
    /// `observation_buildup` category).
    pub fn state_count(&self) -> usize {
        self.state.len()
    }
}

fn _snapshot_benchmark(snapshot: &MarketSnapshot) -> Option<Decimal> {
    snapshot.benchmark_yield_rates.avg_15min
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlmm_core::ids::StrategyType;
    use dlmm_data::snapshot::{BenchmarkYieldRates, HistoricalPriceChanges, HistoricalYieldRates, YieldTrend};
    use rust_decimal_macros::dec;

    fn snapshot(active: i32, lower: i32, upper: i32, net_pnl_pct: Decimal, price: Decimal) -> MarketSnapshot {
        MarketSnapshot {
            current_price: price,
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
    fn in_range_clears_timer_and_does_not_recreate() {
        let mut module = RecreationModule::new();
        let id = StrategyInstanceId::new(StrategyType::SimpleY);
        let config = RecreationConfig::default();
        let snap = snapshot(50, 0, 100, dec!(0.5), dec!(1));
        let decision = module.evaluate(&id, &snap, &config);
        assert!(!decision.is_recreate());
    }

    #[test]
    fn out_of_range_recreates_after_timeout_elapses() {
        let mut module = RecreationModule::new();
        let id = StrategyInstanceId::new(StrategyType::SimpleY);
        let mut config = RecreationConfig::default();
        config.out_of_range_timeout_seconds = 0;
        let snap = snapshot(150, 0, 100, dec!(0.5), dec!(1));

        // First tick starts the timer.
        let first = module.evaluate(&id, &snap, &config);
        assert!(!first.is_recreate());

        // Timeout is zero, so the next tick should fire immediately.
        let second = module.evaluate(&id, &snap, &config);
        assert!(second.is_recreate());
    }

    #[test]
    fn price_guard_blocks_recreation_above_ceiling() {
        let mut module = RecreationModule::new();
        let id = StrategyInstanceId::new(StrategyType::SimpleY);
        let mut config = RecreationConfig::default();
        config.out_of_range_timeout_seconds = 0;
        config.enable_price_check = true;
        config.max_price_for_recreation = Some(dec!(2));
        let snap = snapshot(150, 0, 100, dec!(0.5), dec!(5));

        module.evaluate(&id, &snap, &config);
        let decision = module.evaluate(&id, &snap, &config);
        assert!(!decision.is_recreate());
    }

    #[test]
    fn market_opportunity_fires_when_thresholds_cross() {
        let mut module = RecreationModule::new();
        let id = StrategyInstanceId::new(StrategyType::SimpleY);
        let config = RecreationConfig::default();
        let snap = snapshot(50, 0, 100, dec!(2), dec!(1));
        let decision = module.evaluate(&id, &snap, &config);
        assert!(decision.is_recreate());
    }

    #[test]
    fn loss_recovery_requires_mark_then_trigger() {
        let mut module = RecreationModule::new();
        let id = StrategyInstanceId::new(StrategyType::SimpleY);
        let mut config = RecreationConfig::default();
        config.market_opportunity.enabled = false;

        let mark_snap = snapshot(50, 0, 100, dec!(-1), dec!(1));
        let marked = module.evaluate(&id, &mark_snap, &config);
        assert!(!marked.is_recreate());

        let trigger_snap = snapshot(50, 0, 100, dec!(1), dec!(1));
        let triggered = module.evaluate(&id, &trigger_snap, &config);
        assert!(triggered.is_recreate());
    }
}
