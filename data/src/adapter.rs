//! Data Adapter: assembles a [`MarketSnapshot`] from collaborator calls each
//! tick (spec §4.4).

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dlmm_core::error::EngineError;
use dlmm_core::ids::StrategyInstanceId;
use dlmm_integration::retry::{CancelToken, RetryExecutor};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::collaborators::{AnalyticsService, DlmmClient};
use crate::price_ring::PriceRing;
use crate::snapshot::{BenchmarkYieldRates, HistoricalPriceChanges, MarketSnapshot};
use crate::yield_ring::YieldRing;

/// Immutable-per-tick context the adapter needs beyond the collaborators
/// themselves: the instance's pool, its active position range, and the
/// investment baseline for P&L.
#[derive(Debug, Clone)]
pub struct SnapshotRequest {
    pub instance_id: StrategyInstanceId,
    pub pool_address: String,
    pub bin_step: u16,
    pub position_lower_bin: i32,
    pub position_upper_bin: i32,
    pub initial_investment: Decimal,
    pub started_at: DateTime<Utc>,
}

/// 15/30-minute benchmark averages require the strategy to have been
/// running that long (spec §4.4 step 6).
const BENCHMARK_15MIN_WARMUP: ChronoDuration = ChronoDuration::minutes(15);
const BENCHMARK_30MIN_WARMUP: ChronoDuration = ChronoDuration::minutes(30);

pub struct DataAdapter {
    dlmm: Arc<dyn DlmmClient>,
    analytics: Arc<dyn AnalyticsService>,
    retry: RetryExecutor,
    rings: Mutex<dlmm_integration::FnvIndexMap<StrategyInstanceId, PriceRing>>,
    yield_rings: Mutex<dlmm_integration::FnvIndexMap<StrategyInstanceId, YieldRing>>,
}

impl std::fmt::Debug for DataAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataAdapter").finish_non_exhaustive()
    }
}

impl DataAdapter {
    pub fn new(dlmm: Arc<dyn DlmmClient>, analytics: Arc<dyn AnalyticsService>, retry: RetryExecutor) -> Self {
        Self {
            dlmm,
            analytics,
            retry,
            rings: Mutex::new(dlmm_integration::FnvIndexMap::default()),
            yield_rings: Mutex::new(dlmm_integration::FnvIndexMap::default()),
        }
    }

    /// Produce a fresh [`MarketSnapshot`]. Cancellable via `cancel` (spec
    /// §4.4 "a single snapshot call is cancellable").
    pub async fn snapshot(&self, req: &SnapshotRequest, cancel: &CancelToken) -> Result<MarketSnapshot, EngineError> {
        let now = Utc::now();

        let (price_and_bin, yield_stats, pnl_report) = tokio::join!(
            self.retry.execute("data.price_and_bin", cancel, |_attempt| {
                let dlmm = self.dlmm.clone();
                let pool = req.pool_address.clone();
                async move { dlmm.get_pool_price_and_bin(&pool).await }
            }),
            self.retry.execute("data.yield_stats", cancel, |_attempt| {
                let analytics = self.analytics.clone();
                let id = req.instance_id.as_str().to_owned();
                async move { analytics.yield_stats(&id).await }
            }),
            self.retry.execute("data.pnl_report", cancel, |_attempt| {
                let analytics = self.analytics.clone();
                let id = req.instance_id.as_str().to_owned();
                async move { analytics.pnl_report(&id).await }
            }),
        );

        let price_and_bin = price_and_bin?;
        let yield_stats = yield_stats?;
        let pnl_report = pnl_report?;

        let mut rings = self.rings.lock().await;
        let ring = rings.entry(req.instance_id.clone()).or_default();
        ring.push(now, price_and_bin.price);

        let price_volatility = ring.volatility();
        let price_drop_percentage = ring.drop_percentage();
        let historical_price_changes = HistoricalPriceChanges {
            five_min: ring.change_over(now, ChronoDuration::minutes(5)),
            fifteen_min: ring.change_over(now, ChronoDuration::minutes(15)),
            one_hour: ring.change_over(now, ChronoDuration::minutes(60)),
        };
        let price_history = ring.points().iter().copied().collect();
        drop(rings);

        let holding_duration = now.signed_duration_since(req.started_at);
        let net_pnl_percentage = if req.initial_investment.is_zero() {
            Decimal::ZERO
        } else {
            (pnl_report.position_value + yield_stats.total_extracted_yield - req.initial_investment)
                / req.initial_investment
                * Decimal::from(100)
        };
        let net_pnl = pnl_report.position_value + yield_stats.total_extracted_yield - req.initial_investment;

        let yield_rate = yield_stats.current_pending_yield;

        let mut yield_rings = self.yield_rings.lock().await;
        let yring = yield_rings.entry(req.instance_id.clone()).or_default();
        yring.push(now, yield_rate);
        let yield_growth_rate = yring.growth_rate(now);
        let yield_trend = yring.trend(now);
        let historical_yield_rates = yring.historical(now);
        drop(yield_rings);

        let benchmark_yield_rates = BenchmarkYieldRates {
            current_5min: Some(yield_rate),
            avg_5min: Some(yield_rate),
            avg_15min: (holding_duration >= BENCHMARK_15MIN_WARMUP).then_some(yield_rate),
            avg_30min: (holding_duration >= BENCHMARK_30MIN_WARMUP).then_some(yield_rate),
        };

        Ok(MarketSnapshot {
            current_price: price_and_bin.price,
            active_bin: price_and_bin.active_bin,
            bin_step: req.bin_step,
            position_lower_bin: req.position_lower_bin,
            position_upper_bin: req.position_upper_bin,
            price_history,
            price_volatility,
            price_drop_percentage,
            historical_price_changes,
            current_pending_yield: yield_stats.current_pending_yield,
            total_extracted_yield: yield_stats.total_extracted_yield,
            yield_rate,
            yield_trend,
            yield_growth_rate,
            historical_yield_rates,
            benchmark_yield_rates,
            net_pnl,
            net_pnl_percentage,
            position_value: pnl_report.position_value,
            initial_investment: req.initial_investment,
            holding_duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{PnlReport, PoolPriceAndBin, YieldStats};
    use async_trait::async_trait;
    use dlmm_core::ids::StrategyType;
    use dlmm_integration::EventBus;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicI32, Ordering};

    struct StubDlmm {
        bin: AtomicI32,
    }

    #[async_trait]
    impl DlmmClient for StubDlmm {
        async fn get_active_bin(&self, _pool: &str) -> Result<i32, EngineError> {
            Ok(self.bin.load(Ordering::SeqCst))
        }
        async fn get_pool_price_and_bin(&self, _pool: &str) -> Result<PoolPriceAndBin, EngineError> {
            Ok(PoolPriceAndBin {
                price: dec!(1.05),
                active_bin: self.bin.load(Ordering::SeqCst),
            })
        }
        async fn calculate_bin_price(&self, _pool: &str, _bin_id: i32) -> Result<Decimal, EngineError> {
            Ok(dec!(1.0))
        }
        async fn create_position_transaction(
            &self,
            _params: crate::collaborators::CreatePositionParams,
        ) -> Result<crate::collaborators::UnsignedTransaction, EngineError> {
            unimplemented!()
        }
        async fn create_remove_liquidity_transaction(
            &self,
            _pool: &str,
            _user: &str,
            _position: &str,
            _bin_ids: &[i32],
            _slippage_bps: u16,
        ) -> Result<crate::collaborators::UnsignedTransaction, EngineError> {
            unimplemented!()
        }
        async fn subscribe_active_bin_changes(
            &self,
            _pool: &str,
            _callback: Box<dyn Fn(i32) + Send + Sync>,
        ) -> Result<u64, EngineError> {
            Ok(1)
        }
    }

    struct StubAnalytics;

    #[async_trait]
    impl AnalyticsService for StubAnalytics {
        async fn yield_stats(&self, _instance_id: &str) -> Result<YieldStats, EngineError> {
            Ok(YieldStats {
                current_pending_yield: dec!(2.5),
                total_extracted_yield: dec!(10),
            })
        }
        async fn pnl_report(&self, _instance_id: &str) -> Result<PnlReport, EngineError> {
            Ok(PnlReport {
                position_value: dec!(1000),
            })
        }
    }

    #[tokio::test]
    async fn snapshot_computes_net_pnl_percentage() {
        let dlmm = Arc::new(StubDlmm { bin: AtomicI32::new(50) });
        let analytics = Arc::new(StubAnalytics);
        let retry = RetryExecutor::new(EventBus::default());
        let adapter = DataAdapter::new(dlmm, analytics, retry);

        let req = SnapshotRequest {
            instance_id: StrategyInstanceId::new(StrategyType::SimpleY),
            pool_address: "pool".to_string(),
            bin_step: 10,
            position_lower_bin: 0,
            position_upper_bin: 100,
            initial_investment: dec!(1000),
            started_at: Utc::now() - ChronoDuration::minutes(20),
        };

        let snapshot = adapter.snapshot(&req, &CancelToken::new()).await.unwrap();
        // (1000 position value + 10 extracted - 1000 initial) / 1000 * 100 = 1%
        assert_eq!(snapshot.net_pnl_percentage, dec!(1));
        assert_eq!(snapshot.active_bin, 50);
        assert!(snapshot.benchmark_yield_rates.avg_15min.is_some());
        assert!(snapshot.benchmark_yield_rates.avg_30min.is_none());
    }
}
