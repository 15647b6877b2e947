//! Stable identifiers used across the engine.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use uuid::Uuid;

use crate::error::EngineError;

/// The two strategy families the orchestration engine drives (spec §3).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum StrategyType {
    SimpleY,
    ChainPosition,
}

impl StrategyType {
    /// Stable prefix embedded in every [`StrategyInstanceId`] of this type.
    pub fn id_prefix(self) -> &'static str {
        match self {
            StrategyType::SimpleY => "simple_y",
            StrategyType::ChainPosition => "chain_position",
        }
    }
}

/// Opaque, cheaply-clonable instance identifier, e.g. `simple_y_3f9a...`.
///
/// Uses `SmolStr` the way `toucan-instrument` uses it for exchange/instrument
/// symbols: most ids are short enough to stay inline, so cloning an id never
/// touches the allocator on the hot path.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Display, Deserialize, Serialize)]
pub struct StrategyInstanceId(SmolStr);

impl StrategyInstanceId {
    /// Mint a new id for `kind`, e.g. `simple_y_1a2b3c4d5e6f7a8b`.
    pub fn new(kind: StrategyType) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(SmolStr::new(format!("{}_{}", kind.id_prefix(), &suffix[..16])))
    }

    /// Parse an existing id, verifying it carries a recognised type prefix.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, EngineError> {
        let raw = raw.as_ref();
        let recognised = [StrategyType::SimpleY, StrategyType::ChainPosition]
            .iter()
            .any(|kind| raw.starts_with(kind.id_prefix()));
        if !recognised || raw.len() < 8 {
            return Err(EngineError::validation(format!(
                "strategy instance id '{raw}' does not carry a recognised type prefix"
            )));
        }
        Ok(Self(SmolStr::new(raw)))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// The [`StrategyType`] implied by this id's prefix, if recognised.
    pub fn strategy_type(&self) -> Option<StrategyType> {
        if self.0.starts_with(StrategyType::ChainPosition.id_prefix()) {
            Some(StrategyType::ChainPosition)
        } else if self.0.starts_with(StrategyType::SimpleY.id_prefix()) {
            Some(StrategyType::SimpleY)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_id_carries_type_prefix() {
        let id = StrategyInstanceId::new(StrategyType::SimpleY);
        assert!(id.as_str().starts_with("simple_y_"));
        assert_eq!(id.strategy_type(), Some(StrategyType::SimpleY));
    }

    #[test]
    fn parse_rejects_unknown_prefix() {
        assert!(StrategyInstanceId::parse("widget_123").is_err());
    }

    #[test]
    fn parse_accepts_chain_position_prefix() {
        let id = StrategyInstanceId::parse("chain_position_abcdef0123456789").unwrap();
        assert_eq!(id.strategy_type(), Some(StrategyType::ChainPosition));
    }
}
