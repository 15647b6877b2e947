//! Collaborator contracts the core consumes (spec §6). These are the
//! boundaries of the engine — real DLMM/RPC/gas integrations are out of
//! scope; callers inject their own implementation (or a test double) behind
//! `Arc<dyn _>`.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use dlmm_core::error::EngineError;

/// A swap or liquidity transaction ready for submission, opaque to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub payload_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolPriceAndBin {
    pub price: Decimal,
    pub active_bin: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePositionParams {
    pub pool: String,
    pub lower_bin: i32,
    pub upper_bin: i32,
    pub amount: Decimal,
    pub slippage_bps: u16,
}

/// Reads/writes against a DLMM pool (spec §6 "DLMM client").
#[async_trait]
pub trait DlmmClient: Send + Sync {
    async fn get_active_bin(&self, pool: &str) -> Result<i32, EngineError>;
    async fn get_pool_price_and_bin(&self, pool: &str) -> Result<PoolPriceAndBin, EngineError>;
    async fn calculate_bin_price(&self, pool: &str, bin_id: i32) -> Result<Decimal, EngineError>;
    async fn create_position_transaction(
        &self,
        params: CreatePositionParams,
    ) -> Result<UnsignedTransaction, EngineError>;
    async fn create_remove_liquidity_transaction(
        &self,
        pool: &str,
        user: &str,
        position: &str,
        bin_ids: &[i32],
        slippage_bps: u16,
    ) -> Result<UnsignedTransaction, EngineError>;
    /// Returns a subscription id the caller can use to later unsubscribe.
    async fn subscribe_active_bin_changes(
        &self,
        pool: &str,
        callback: Box<dyn Fn(i32) + Send + Sync>,
    ) -> Result<u64, EngineError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapQuote {
    pub amount_out: Decimal,
    pub price_impact_bps: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapOutcome {
    pub signature: String,
    pub amount_in: Decimal,
    pub amount_out: Decimal,
    pub price_impact_bps: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteSwapParams {
    pub input_mint: String,
    pub output_mint: String,
    pub amount: Decimal,
    pub slippage_bps: u16,
}

/// Token swap collaborator (spec §6 "Swap client").
#[async_trait]
pub trait SwapClient: Send + Sync {
    async fn get_quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: Decimal,
        slippage_bps: u16,
    ) -> Result<SwapQuote, EngineError>;
    async fn execute_swap(&self, params: ExecuteSwapParams) -> Result<SwapOutcome, EngineError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSubmission {
    pub success: bool,
    pub signature: Option<String>,
    pub status: String,
    pub gas_used: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendOptions {
    pub max_priority_fee_lamports: Option<u64>,
    pub skip_preflight: bool,
}

/// RPC/transaction submission collaborator (spec §6 "RPC/transaction client").
#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn send_transaction(
        &self,
        tx: &UnsignedTransaction,
        options: SendOptions,
    ) -> Result<TransactionSubmission, EngineError>;
    async fn get_latest_blockhash(&self) -> Result<String, EngineError>;
    async fn simulate_transaction(&self, tx: &UnsignedTransaction) -> Result<(), EngineError>;
}

/// Priority-fee advisor (spec §6 "Gas service").
#[async_trait]
pub trait GasService: Send + Sync {
    async fn get_smart_priority_fee(&self, has_recent_failures: bool) -> Result<u64, EngineError>;
    async fn get_stop_loss_max_priority_fee(&self) -> Result<u64, EngineError>;
    async fn get_emergency_priority_fee_after_timeout(&self) -> Result<u64, EngineError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct YieldStats {
    pub current_pending_yield: Decimal,
    pub total_extracted_yield: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PnlReport {
    pub position_value: Decimal,
}

/// Price history / yield / P&L analytics collaborator (spec §4.4). This is
/// the engine's own analytics surface, not an on-chain integration, but it
/// is still injected as a collaborator so the Data Adapter stays testable.
#[async_trait]
pub trait AnalyticsService: Send + Sync {
    async fn yield_stats(&self, instance_id: &str) -> Result<YieldStats, EngineError>;
    async fn pnl_report(&self, instance_id: &str) -> Result<PnlReport, EngineError>;
}
