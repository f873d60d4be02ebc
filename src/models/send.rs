use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether a failed send is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureClass {
    /// Network errors, 5xx, 408 and 429.
    Transient,
    /// Every other 4xx, and malformed acknowledgments of requests the
    /// platform already accepted.
    Terminal,
}

impl FailureClass {
    pub fn for_status(status: u16) -> Self {
        match status {
            408 | 429 => FailureClass::Transient,
            500..=599 => FailureClass::Transient,
            _ => FailureClass::Terminal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{class:?} send failure: {message}")]
pub struct SendError {
    pub class: FailureClass,
    pub message: String,
}

impl SendError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Transient,
            message: message.into(),
        }
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Terminal,
            message: message.into(),
        }
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        let message = if body.is_empty() {
            format!("channel returned status {}", status)
        } else {
            format!("channel returned status {}: {}", status, truncate(body, 256))
        };

        Self {
            class: FailureClass::for_status(status),
            message,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class == FailureClass::Transient
    }
}

/// What a channel adapter reports back for one send.
///
/// Adapters never return `Err`: every failure is folded into `success = false`
/// with a classified [`SendError`].
#[derive(Debug, Clone, Serialize)]
pub struct SendResult {
    pub http_status: Option<u16>,
    pub body: String,
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SendError>,

    /// Key under which an asynchronous channel reports delivery.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
}

impl SendResult {
    pub fn delivered(http_status: u16, body: String) -> Self {
        Self {
            http_status: Some(http_status),
            body,
            success: true,
            error: None,
            tracking_id: None,
        }
    }

    pub fn accepted(http_status: u16, body: String, tracking_id: String) -> Self {
        Self {
            http_status: Some(http_status),
            body,
            success: true,
            error: None,
            tracking_id: Some(tracking_id),
        }
    }

    pub fn failed(error: SendError, http_status: Option<u16>, body: String) -> Self {
        Self {
            http_status,
            body,
            success: false,
            error: Some(error),
            tracking_id: None,
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
