#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]

//! # dlmm-strategies
//!
//! The `StrategyConfig` schema (spec §6), validated on accept following the
//! teacher's `InstrumentConfig`/`SystemConfig` validate-on-construct idiom,
//! and the [`instance::StrategyInstance`] record the Manager owns (spec §3).

pub mod config;
pub mod error;
pub mod instance;

pub use config::{MonitoringConfig, StrategyConfig, YieldConfig};
pub use error::ConfigError;
pub use instance::{InstanceMetadata, InstanceStatus, StrategyInstance};
