use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Whether an entry at `self` should be written given a stream's `min` filter.
    pub fn passes(self, min: LogLevel) -> bool {
        self >= min
    }
}
