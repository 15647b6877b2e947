use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::level::LogLevel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub category: String,
    pub message: String,
    pub instance_id: Option<String>,
    pub data: Option<serde_json::Value>,
}
