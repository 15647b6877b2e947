//! Public response envelope returned by every create/update/control operation (spec §7).

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// `{success, data?, error?, meta}` envelope returned to API callers.
///
/// `error` is always the short human string from [`EngineError::as_short`];
/// full detail is written to the business-operations log, not returned here.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OperationResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub meta: OperationMeta,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OperationMeta {
    pub correlation_id: Option<String>,
}

impl<T> OperationResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: OperationMeta::default(),
        }
    }

    pub fn err(error: &EngineError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.as_short()),
            meta: OperationMeta::default(),
        }
    }

    pub fn with_correlation(mut self, id: impl Into<String>) -> Self {
        self.meta.correlation_id = Some(id.into());
        self
    }
}
