use serde::{Deserialize, Serialize};

/// The streams named in spec §4.3. `InstanceOperations`/`InstanceMonitoring`
/// each key a per-instance file under `strategies/instance-<id>/...`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum LogCategory {
    System,
    BusinessOperations,
    BusinessMonitoring,
    InstanceOperations(String),
    InstanceMonitoring(String),
}

impl LogCategory {
    /// Relative path (under the logger's root) of this category's stream file.
    pub fn relative_path(&self) -> String {
        match self {
            LogCategory::System => "system/system.log".to_string(),
            LogCategory::BusinessOperations => "business/operations.log".to_string(),
            LogCategory::BusinessMonitoring => "business/monitoring.log".to_string(),
            LogCategory::InstanceOperations(id) => format!("strategies/instance-{id}/operations/{id}.log"),
            LogCategory::InstanceMonitoring(id) => format!("strategies/instance-{id}/monitoring/{id}.log"),
        }
    }

    /// Stable label used as the read API's `byCategory` key and in the ring index.
    pub fn label(&self) -> String {
        match self {
            LogCategory::System => "system".to_string(),
            LogCategory::BusinessOperations => "business-operations".to_string(),
            LogCategory::BusinessMonitoring => "business-monitoring".to_string(),
            LogCategory::InstanceOperations(id) => format!("instance-operations:{id}"),
            LogCategory::InstanceMonitoring(id) => format!("instance-monitoring:{id}"),
        }
    }
}
