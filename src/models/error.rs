use serde::Serialize;
use thiserror::Error;

use crate::models::{channel::Channel, schema::Violation};

/// Terminal error carried by a settled dispatch.
///
/// Only `TransientSend` is ever recovered locally, and only while the retry
/// policy allows; it surfaces here once attempts are exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchError {
    #[error("transient send failure after {attempts} attempt(s): {message}")]
    TransientSend { attempts: u32, message: String },

    #[error("terminal send failure: {message}")]
    TerminalSend { status: Option<u16>, message: String },

    #[error(
        "payload violates schema contract {channel}/{version} ({} violation(s))",
        .violations.len()
    )]
    SchemaViolation {
        channel: Channel,
        version: String,
        violations: Vec<Violation>,
    },

    #[error("delivery not confirmed within {deadline_ms}ms")]
    VerificationTimeout { deadline_ms: u64 },

    #[error("delivery rejected for trace {trace_id}")]
    DeliveryRejected { trace_id: String },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("notification {notification_id} already has a dispatch in flight")]
    AlreadyInFlight { notification_id: String },
}

impl DispatchError {
    pub fn configuration(message: impl Into<String>) -> Self {
        DispatchError::Configuration {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::TransientSend { .. } => "transient_send",
            DispatchError::TerminalSend { .. } => "terminal_send",
            DispatchError::SchemaViolation { .. } => "schema_violation",
            DispatchError::VerificationTimeout { .. } => "verification_timeout",
            DispatchError::DeliveryRejected { .. } => "delivery_rejected",
            DispatchError::Configuration { .. } => "configuration",
            DispatchError::AlreadyInFlight { .. } => "already_in_flight",
        }
    }
}
