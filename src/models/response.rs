use serde::Serialize;

use crate::models::result::DispatchResult;

/// JSON envelope returned by every API handler.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Machine-readable error discriminator, e.g. `schema_violation`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,

    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
            message: message.into(),
        }
    }
}

impl ApiResponse<DispatchResult> {
    /// Wraps a settled dispatch; failures keep the full result as data.
    pub fn from_dispatch(result: DispatchResult) -> Self {
        let Some((error, error_kind)) = result
            .error
            .as_ref()
            .map(|error| (error.to_string(), error.kind()))
        else {
            return Self::success(result, "Notification delivered");
        };

        Self {
            success: false,
            data: Some(result),
            error: Some(error),
            error_kind: Some(error_kind),
            message: "Notification not delivered".to_string(),
        }
    }
}
