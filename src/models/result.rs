use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{
    attempt::DispatchAttempt, channel::Channel, delivery::DeliveryRecord, error::DispatchError,
    schema::ValidationResult, status::DeliveryStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SettledOutcome {
    Success,
    Failure,
}

/// Lifecycle of one dispatch.
///
/// ```text
/// Created -> Sending -> Succeeded -> Settled(Success)
///                    -> Retrying -> Sending
///                    -> AwaitingVerification -> Settled(_)
///                    -> Settled(Failure)
/// Created -> Settled(Failure)            (rejected before sending)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Created,
    Sending,
    Retrying,
    Succeeded,
    AwaitingVerification,
    Settled(SettledOutcome),
}

impl DispatchState {
    pub fn can_transition_to(self, next: DispatchState) -> bool {
        use DispatchState::*;

        matches!(
            (self, next),
            (Created, Sending)
                | (Created, Settled(SettledOutcome::Failure))
                | (Sending, Succeeded)
                | (Sending, Retrying)
                | (Sending, AwaitingVerification)
                | (Sending, Settled(SettledOutcome::Failure))
                | (Retrying, Sending)
                | (Succeeded, Settled(SettledOutcome::Success))
                | (AwaitingVerification, Settled(_))
        )
    }

    pub fn is_settled(self) -> bool {
        matches!(self, DispatchState::Settled(_))
    }
}

/// Terminal answer for one submitted request.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
    pub notification_id: String,
    pub channel: Channel,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    pub outcome: SettledOutcome,
    pub delivery_status: DeliveryStatus,
    pub attempts: Vec<DispatchAttempt>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryRecord>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,

    pub history: Vec<DispatchState>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DispatchError>,

    pub elapsed_ms: u64,
}

impl DispatchResult {
    pub fn is_success(&self) -> bool {
        self.outcome == SettledOutcome::Success
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    pub fn verification_attempted(&self) -> bool {
        self.history.contains(&DispatchState::AwaitingVerification)
    }
}
