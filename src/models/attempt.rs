use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::send::{SendError, SendResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchAttempt {
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<SendError>,
}

impl DispatchAttempt {
    pub fn from_send(
        attempt_number: u32,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        result: &SendResult,
    ) -> Self {
        let outcome = if result.success {
            AttemptOutcome::Success
        } else {
            AttemptOutcome::Failure
        };

        Self {
            attempt_number,
            started_at,
            completed_at,
            outcome,
            http_status: result.http_status,
            error_detail: result.error.clone(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == AttemptOutcome::Success
    }
}
