//! `Decision` emitted by the Smart Stop-Loss and Position-Recreation modules
//! (spec §3, §4.5, §4.6).

use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Display, Serialize, Deserialize)]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum StopLossAction {
    Hold,
    Alert,
    FullExit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopLossDecision {
    pub action: StopLossAction,
    pub confidence: u8,
    pub urgency: Urgency,
    pub reasoning: Vec<String>,
    pub next_evaluation_hint: Option<String>,
    pub suggested_exit_percentage: Option<Decimal>,
    /// `0.6*liquidityRisk + 0.2*priceRisk + 0.2*yieldRisk` (spec §4.5).
    pub risk_score: Decimal,
}

impl StopLossDecision {
    pub fn hold(reasoning: impl Into<String>, risk_score: Decimal) -> Self {
        Self {
            action: StopLossAction::Hold,
            confidence: 100,
            urgency: Urgency::Low,
            reasoning: vec![reasoning.into()],
            next_evaluation_hint: None,
            suggested_exit_percentage: None,
            risk_score,
        }
    }

    pub fn alert(reasoning: Vec<String>, confidence: u8, risk_score: Decimal) -> Self {
        Self {
            action: StopLossAction::Alert,
            confidence,
            urgency: Urgency::Medium,
            reasoning,
            next_evaluation_hint: None,
            suggested_exit_percentage: None,
            risk_score,
        }
    }

    pub fn full_exit(reasoning: Vec<String>, urgency: Urgency, risk_score: Decimal) -> Self {
        Self {
            action: StopLossAction::FullExit,
            confidence: 90,
            urgency,
            reasoning,
            next_evaluation_hint: None,
            suggested_exit_percentage: Some(Decimal::from(100)),
            risk_score,
        }
    }
}

/// Reason code attached to a [`RecreationDecision`] (spec §4.6 rules 0-5).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display, Serialize, Deserialize)]
pub enum RecreationReason {
    PositionTooLow,
    OutOfRange,
    PriceCheckFailed,
    MarketOpportunity,
    LossRecovery,
    DynamicProfit,
    Idle,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum RecreationAction {
    NoRecreate { reason: RecreationReason },
    Recreate { reason: RecreationReason },
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct RecreationDecision {
    pub action: RecreationAction,
    pub confidence: u8,
    pub urgency: Urgency,
    pub reasoning: Vec<String>,
    pub next_evaluation_hint: Option<String>,
}

impl RecreationDecision {
    pub fn no_recreate(reason: RecreationReason, confidence: u8, reasoning: impl Into<String>) -> Self {
        Self {
            action: RecreationAction::NoRecreate { reason },
            confidence,
            urgency: Urgency::Low,
            reasoning: vec![reasoning.into()],
            next_evaluation_hint: None,
        }
    }

    pub fn recreate(reason: RecreationReason, confidence: u8, urgency: Urgency, reasoning: impl Into<String>) -> Self {
        Self {
            action: RecreationAction::Recreate { reason },
            confidence,
            urgency,
            reasoning: vec![reasoning.into()],
            next_evaluation_hint: None,
        }
    }

    pub fn is_recreate(&self) -> bool {
        matches!(self.action, RecreationAction::Recreate { .. })
    }
}
