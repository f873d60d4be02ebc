use std::sync::Arc;

use chrono::Utc;
use tokio::time::{Duration, Instant, sleep, timeout};
use tracing::{debug, info, warn};

use crate::{
    clients::status_store::DeliveryStatusStore,
    models::{delivery::DeliveryRecord, error::DispatchError, status::DeliveryStatus},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationSettings {
    pub poll_interval: Duration,
    pub deadline: Duration,
}

impl VerificationSettings {
    pub fn new(poll_interval: Duration, deadline: Duration) -> Result<Self, DispatchError> {
        if poll_interval.is_zero() {
            return Err(DispatchError::configuration(
                "poll interval must be greater than zero",
            ));
        }

        Ok(Self {
            poll_interval,
            deadline,
        })
    }

    /// Latest point at which `verify` is guaranteed to have answered.
    pub fn upper_bound(&self) -> Duration {
        self.deadline.saturating_add(self.poll_interval)
    }
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            deadline: Duration::from_secs(20),
        }
    }
}

/// Bounded polling of the delivery-status store.
pub struct DeliveryVerifier {
    store: Arc<dyn DeliveryStatusStore>,
    settings: VerificationSettings,
}

impl DeliveryVerifier {
    pub fn new(store: Arc<dyn DeliveryStatusStore>, settings: VerificationSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> VerificationSettings {
        self.settings
    }

    /// Polls until the store reports a terminal status or `deadline` passes.
    ///
    /// The first read happens immediately. The returned record is always
    /// terminal, and the call returns within `deadline + poll_interval` even
    /// when a store read hangs.
    pub async fn verify(
        &self,
        notification_id: &str,
        trace_id: &str,
        deadline: Duration,
    ) -> DeliveryRecord {
        let started = Instant::now();
        let bound = deadline.saturating_add(self.settings.poll_interval);
        let mut record = DeliveryRecord::pending(notification_id, trace_id);

        let polled = timeout(bound, self.poll(&mut record, started, deadline)).await;

        if polled.is_err() {
            warn!(
                notification_id,
                trace_id,
                bound_ms = bound.as_millis() as u64,
                "Delivery-status store did not answer in time"
            );
            self.settle(&mut record, DeliveryStatus::TimedOut);
        }

        record
    }

    async fn poll(&self, record: &mut DeliveryRecord, started: Instant, deadline: Duration) {
        loop {
            let observed = self.observe(record).await;
            record.record_poll(Utc::now());

            if observed.is_terminal() {
                info!(
                    notification_id = record.notification_id(),
                    status = %observed,
                    polls = record.polls(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Delivery status confirmed"
                );
                self.settle(record, observed);
                return;
            }

            let elapsed = started.elapsed();
            if elapsed >= deadline {
                warn!(
                    notification_id = record.notification_id(),
                    polls = record.polls(),
                    deadline_ms = deadline.as_millis() as u64,
                    "Delivery not confirmed before deadline"
                );
                self.settle(record, DeliveryStatus::TimedOut);
                return;
            }

            sleep(self.settings.poll_interval.min(deadline - elapsed)).await;
        }
    }

    /// Reads the trace key, then the notification id when they differ.
    async fn observe(&self, record: &DeliveryRecord) -> DeliveryStatus {
        let mut keys = vec![record.trace_id()];
        if record.notification_id() != record.trace_id() {
            keys.push(record.notification_id());
        }

        for key in keys {
            match self.store.read(key).await {
                Ok(Some(observation)) => match observation.delivery_status() {
                    Some(status) => return status,
                    None => {
                        warn!(
                            key,
                            value = %observation.status,
                            "Unknown delivery status, treating as pending"
                        );
                        return DeliveryStatus::Pending;
                    }
                },
                Ok(None) => continue,
                Err(e) => {
                    warn!(key, error = %e, "Delivery-status read failed, treating as pending");
                    return DeliveryStatus::Pending;
                }
            }
        }

        debug!(notification_id = record.notification_id(), "No delivery status recorded yet");
        DeliveryStatus::Pending
    }

    fn settle(&self, record: &mut DeliveryRecord, status: DeliveryStatus) {
        if let Err(e) = record.settle(status, Utc::now()) {
            warn!(error = %e, "Ignored delivery status transition");
        }
    }
}
