//! Instance lifecycle stages (spec §4.7). `SimpleY` uses the plain shape;
//! `ChainPosition` layers a second, lower position on top of it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    NoPosition,
    YPositionOnly,
    OutOfRange,
    StopLossTriggered,
    Cleanup,
}

impl Stage {
    /// Whether `next` is a legal transition from `self` (spec §4.7's edge list).
    pub fn can_transition_to(self, next: Stage) -> bool {
        use Stage::*;
        matches!(
            (self, next),
            (NoPosition, YPositionOnly)
                | (YPositionOnly, OutOfRange)
                | (OutOfRange, YPositionOnly)
                | (YPositionOnly, StopLossTriggered)
                | (OutOfRange, StopLossTriggered)
                | (StopLossTriggered, Cleanup)
                // A recreation close-then-create can succeed at the close
                // and exhaust retries on the create, leaving the instance
                // without a position but without having gone through
                // StopLossTriggered (spec §4.7 "well-defined Cleanup state").
                | (YPositionOnly, Cleanup)
                | (OutOfRange, Cleanup)
                // The very first position creation (still NoPosition) can
                // also exhaust retries.
                | (NoPosition, Cleanup)
                | (Cleanup, NoPosition)
                // Re-entrant/no-op edges the executor applies every tick.
                | (NoPosition, NoPosition)
                | (YPositionOnly, YPositionOnly)
                | (OutOfRange, OutOfRange)
                | (StopLossTriggered, StopLossTriggered)
                | (Cleanup, Cleanup)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_lifecycle_edges_are_legal() {
        assert!(Stage::NoPosition.can_transition_to(Stage::YPositionOnly));
        assert!(Stage::YPositionOnly.can_transition_to(Stage::OutOfRange));
        assert!(Stage::OutOfRange.can_transition_to(Stage::YPositionOnly));
        assert!(Stage::YPositionOnly.can_transition_to(Stage::StopLossTriggered));
        assert!(Stage::StopLossTriggered.can_transition_to(Stage::Cleanup));
        assert!(Stage::Cleanup.can_transition_to(Stage::NoPosition));
    }

    #[test]
    fn skipping_straight_to_stop_loss_from_no_position_is_illegal() {
        assert!(!Stage::NoPosition.can_transition_to(Stage::StopLossTriggered));
    }
}
