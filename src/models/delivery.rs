use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::models::status::DeliveryStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryTransitionError {
    #[error("delivery record {notification_id} is already {status}")]
    AlreadyTerminal {
        notification_id: String,
        status: DeliveryStatus,
    },

    #[error("delivery record {notification_id} cannot settle as {status}")]
    NotTerminal {
        notification_id: String,
        status: DeliveryStatus,
    },
}

/// Eventual delivery state of an asynchronous dispatch.
///
/// Only the delivery verifier mutates a record, and a record that has left
/// `Pending` never changes again.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryRecord {
    notification_id: String,
    status: DeliveryStatus,
    last_checked_at: Option<DateTime<Utc>>,
    trace_id: String,
    polls: u32,
}

impl DeliveryRecord {
    pub fn pending(notification_id: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            notification_id: notification_id.into(),
            status: DeliveryStatus::Pending,
            last_checked_at: None,
            trace_id: trace_id.into(),
            polls: 0,
        }
    }

    pub fn notification_id(&self) -> &str {
        &self.notification_id
    }

    pub fn status(&self) -> DeliveryStatus {
        self.status
    }

    pub fn last_checked_at(&self) -> Option<DateTime<Utc>> {
        self.last_checked_at
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub(crate) fn record_poll(&mut self, at: DateTime<Utc>) {
        self.polls += 1;
        self.last_checked_at = Some(at);
    }

    pub(crate) fn settle(
        &mut self,
        status: DeliveryStatus,
        at: DateTime<Utc>,
    ) -> Result<(), DeliveryTransitionError> {
        if self.status.is_terminal() {
            return Err(DeliveryTransitionError::AlreadyTerminal {
                notification_id: self.notification_id.clone(),
                status: self.status,
            });
        }

        if !status.is_terminal() {
            return Err(DeliveryTransitionError::NotTerminal {
                notification_id: self.notification_id.clone(),
                status,
            });
        }

        self.status = status;
        self.last_checked_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settled_record_rejects_second_transition() {
        let mut record = DeliveryRecord::pending("n-1", "trace-1");
        record.settle(DeliveryStatus::Delivered, Utc::now()).unwrap();

        let err = record
            .settle(DeliveryStatus::TimedOut, Utc::now())
            .unwrap_err();

        assert!(matches!(err, DeliveryTransitionError::AlreadyTerminal { .. }));
        assert_eq!(record.status(), DeliveryStatus::Delivered);
    }

    #[test]
    fn settling_as_pending_is_rejected() {
        let mut record = DeliveryRecord::pending("n-2", "trace-2");

        assert!(record.settle(DeliveryStatus::Pending, Utc::now()).is_err());
        assert!(!record.is_terminal());
    }

    #[test]
    fn polls_are_counted() {
        let mut record = DeliveryRecord::pending("n-3", "trace-3");
        record.record_poll(Utc::now());
        record.record_poll(Utc::now());

        assert_eq!(record.polls(), 2);
        assert!(record.last_checked_at().is_some());
    }
}
