//! Versioned snapshot envelope (spec §4.9: "migration between snapshot
//! versions is explicit via a version field").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current on-disk envelope version. Bump when `T`'s shape changes in a way
/// that requires an explicit migration step rather than plain `serde`
/// forward-compatibility (added optional fields don't need a bump).
pub const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            version: CURRENT_VERSION,
            saved_at: Utc::now(),
            payload,
        }
    }
}
