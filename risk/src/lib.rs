#![forbid(unsafe_code)]
#![warn(unused, clippy::cognitive_complexity, missing_debug_implementations, rust_2018_idioms)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]

//! # dlmm-risk
//!
//! The Smart Stop-Loss Module ([`stop_loss::StopLossModule`], spec §4.5) and
//! the Position-Recreation Module ([`recreation::RecreationModule`], spec
//! §4.6). Both are modeled the way the teacher shapes a `RiskManager`: a
//! small struct holding per-instance state, exposing one `evaluate` method,
//! rather than a class hierarchy.

pub mod config;
pub mod decision;
pub mod recreation;
pub mod stop_loss;

pub use config::{DynamicProfitConfig, LossRecoveryConfig, MarketOpportunityConfig, RecreationConfig, StopLossConfig};
pub use decision::{RecreationAction, RecreationDecision, RecreationReason, StopLossAction, StopLossDecision, Urgency};
pub use recreation::RecreationModule;
pub use stop_loss::StopLossModule;
