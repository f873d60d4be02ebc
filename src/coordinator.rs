use std::{
    collections::{BTreeMap, HashSet},
    sync::{Arc, Mutex, PoisonError},
};

use chrono::Utc;
use futures_util::{StreamExt, stream};
use tokio::time::{Duration, Instant, sleep};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::{
    clients::{
        channel::{AdapterRegistry, ChannelAdapter},
        schema_store::SchemaStore,
        status_store::DeliveryStatusStore,
    },
    models::{
        attempt::DispatchAttempt,
        channel::{AckMode, Channel},
        delivery::DeliveryRecord,
        error::DispatchError,
        request::{NotificationRequest, SubmitOptions},
        result::{DispatchResult, DispatchState, SettledOutcome},
        retry::RetryPolicy,
        schema::ValidationResult,
        send::{FailureClass, SendError},
        status::DeliveryStatus,
    },
    validator::SchemaValidator,
    verifier::{DeliveryVerifier, VerificationSettings},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    pub retry_policy: RetryPolicy,
    pub verification: VerificationSettings,
    pub worker_concurrency: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            verification: VerificationSettings::default(),
            worker_concurrency: 8,
        }
    }
}

/// Ids of requests that currently have a dispatch running.
#[derive(Debug, Default, Clone)]
pub struct InFlightRegistry {
    ids: Arc<Mutex<HashSet<String>>>,
}

impl InFlightRegistry {
    /// Claims `id`, or returns `None` when another dispatch already holds it.
    pub fn claim(&self, id: &str) -> Option<InFlightGuard> {
        let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);

        if !ids.insert(id.to_string()) {
            return None;
        }

        Some(InFlightGuard {
            ids: Arc::clone(&self.ids),
            id: id.to_string(),
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases the claim when dropped, including on cancellation.
#[derive(Debug)]
pub struct InFlightGuard {
    ids: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

pub struct DispatchCoordinator {
    adapters: AdapterRegistry,
    validator: SchemaValidator,
    verifier: DeliveryVerifier,
    settings: DispatchSettings,
    in_flight: InFlightRegistry,
}

impl DispatchCoordinator {
    pub fn builder() -> DispatchCoordinatorBuilder {
        DispatchCoordinatorBuilder::default()
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    pub fn in_flight(&self) -> &InFlightRegistry {
        &self.in_flight
    }

    pub async fn submit(&self, request: NotificationRequest) -> DispatchResult {
        self.submit_with(request, SubmitOptions::default()).await
    }

    /// Runs one request to a terminal result.
    ///
    /// Never fails: every error ends up in the returned result.
    pub async fn submit_with(
        &self,
        request: NotificationRequest,
        options: SubmitOptions,
    ) -> DispatchResult {
        let run = DispatchRun::new(&request, &options);

        let Some(_guard) = self.in_flight.claim(request.id()) else {
            warn!(
                notification_id = request.id(),
                "Dispatch already in flight, rejecting duplicate submission"
            );
            return run.reject(DispatchError::AlreadyInFlight {
                notification_id: request.id().to_string(),
            });
        };

        let span = info_span!(
            "dispatch",
            notification_id = %request.id(),
            channel = %request.channel(),
            owner = options.owner.as_deref().unwrap_or("unknown"),
            labels = ?options.labels,
        );

        self.dispatch(&request, &options, run).instrument(span).await
    }

    /// Processes many requests with at most `worker_concurrency` in flight.
    ///
    /// Results come back in completion order.
    pub async fn submit_all<I>(&self, requests: I) -> Vec<DispatchResult>
    where
        I: IntoIterator<Item = NotificationRequest>,
    {
        stream::iter(requests)
            .map(|request| self.submit(request))
            .buffer_unordered(self.settings.worker_concurrency.max(1))
            .collect()
            .await
    }

    async fn dispatch(
        &self,
        request: &NotificationRequest,
        options: &SubmitOptions,
        mut run: DispatchRun,
    ) -> DispatchResult {
        let Some(adapter) = self.adapters.get(request.channel()) else {
            error!("No channel adapter registered");
            return run.reject(DispatchError::configuration(format!(
                "no channel adapter registered for {}",
                request.channel()
            )));
        };

        let validation = match self.validator.validate_request(request, options) {
            Ok(validation) => validation,
            Err(e) => {
                error!(error = %e, "Schema contract unavailable");
                return run.reject(e);
            }
        };

        if !validation.valid {
            warn!(
                violations = validation.violations.len(),
                "Payload rejected by schema contract"
            );
            let error = DispatchError::SchemaViolation {
                channel: request.channel(),
                version: validation.version.clone().unwrap_or_default(),
                violations: validation.violations.clone(),
            };
            run.validation = Some(validation);
            return run.reject(error);
        }
        run.validation = Some(validation);

        let policy = options
            .retry_policy
            .clone()
            .unwrap_or_else(|| self.settings.retry_policy.clone());

        self.send_with_policy(request, adapter.as_ref(), &policy, run)
            .await
    }

    async fn send_with_policy(
        &self,
        request: &NotificationRequest,
        adapter: &dyn ChannelAdapter,
        policy: &RetryPolicy,
        mut run: DispatchRun,
    ) -> DispatchResult {
        loop {
            run.advance(DispatchState::Sending);

            let attempt_number = run.attempts.len() as u32 + 1;
            let started_at = Utc::now();
            let sent = adapter.send(request).await;
            let attempt =
                DispatchAttempt::from_send(attempt_number, started_at, Utc::now(), &sent);

            debug!(
                attempt = attempt_number,
                success = sent.success,
                http_status = ?sent.http_status,
                "Dispatch attempt completed"
            );

            let retry = policy.should_retry(attempt_number, &attempt);
            run.attempts.push(attempt);

            if sent.success {
                return match adapter.ack_mode() {
                    AckMode::Synchronous => {
                        run.advance(DispatchState::Succeeded);
                        info!(attempts = attempt_number, "Notification delivered");
                        run.settle(SettledOutcome::Success, DeliveryStatus::Delivered, None)
                    }
                    AckMode::Asynchronous => {
                        run.advance(DispatchState::AwaitingVerification);
                        let trace_id = sent
                            .tracking_id
                            .unwrap_or_else(|| request.id().to_string());
                        info!(
                            trace_id = %trace_id,
                            "Notification accepted, awaiting delivery confirmation"
                        );

                        let deadline = self.verifier.settings().deadline;
                        let record = self
                            .verifier
                            .verify(request.id(), &trace_id, deadline)
                            .await;
                        run.settle_verified(record, deadline)
                    }
                };
            }

            if retry {
                let delay = policy.next_delay(attempt_number);
                run.advance(DispatchState::Retrying);
                warn!(
                    attempt = attempt_number,
                    max_attempts = policy.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "Dispatch attempt failed, backing off"
                );
                sleep(delay).await;
                continue;
            }

            let failure = sent
                .error
                .unwrap_or_else(|| SendError::transient("adapter reported failure without detail"));

            let error = match failure.class {
                FailureClass::Terminal => DispatchError::TerminalSend {
                    status: sent.http_status,
                    message: failure.message,
                },
                FailureClass::Transient => DispatchError::TransientSend {
                    attempts: attempt_number,
                    message: failure.message,
                },
            };

            warn!(attempts = attempt_number, error = %error, "Dispatch failed");
            return run.settle(SettledOutcome::Failure, DeliveryStatus::Failed, Some(error));
        }
    }
}

/// Mutable bookkeeping for one dispatch; consumed when it settles.
struct DispatchRun {
    notification_id: String,
    channel: Channel,
    labels: BTreeMap<String, String>,
    state: DispatchState,
    history: Vec<DispatchState>,
    attempts: Vec<DispatchAttempt>,
    validation: Option<ValidationResult>,
    delivery: Option<DeliveryRecord>,
    started: Instant,
}

impl DispatchRun {
    fn new(request: &NotificationRequest, options: &SubmitOptions) -> Self {
        Self {
            notification_id: request.id().to_string(),
            channel: request.channel(),
            labels: options.labels.clone(),
            state: DispatchState::Created,
            history: vec![DispatchState::Created],
            attempts: Vec::new(),
            validation: None,
            delivery: None,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: DispatchState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal dispatch transition {:?} -> {:?}",
            self.state,
            next
        );
        if !self.state.can_transition_to(next) {
            error!(from = ?self.state, to = ?next, "Illegal dispatch transition");
        }

        self.state = next;
        self.history.push(next);
    }

    /// Settles a request that never reached the channel.
    fn reject(self, error: DispatchError) -> DispatchResult {
        self.settle(SettledOutcome::Failure, DeliveryStatus::Failed, Some(error))
    }

    fn settle_verified(mut self, record: DeliveryRecord, deadline: Duration) -> DispatchResult {
        let status = record.status();
        let trace_id = record.trace_id().to_string();
        self.delivery = Some(record);

        match status {
            DeliveryStatus::Delivered => self.settle(SettledOutcome::Success, status, None),
            DeliveryStatus::Failed => self.settle(
                SettledOutcome::Failure,
                status,
                Some(DispatchError::DeliveryRejected { trace_id }),
            ),
            DeliveryStatus::TimedOut | DeliveryStatus::Pending => self.settle(
                SettledOutcome::Failure,
                DeliveryStatus::TimedOut,
                Some(DispatchError::VerificationTimeout {
                    deadline_ms: deadline.as_millis() as u64,
                }),
            ),
        }
    }

    fn settle(
        mut self,
        outcome: SettledOutcome,
        delivery_status: DeliveryStatus,
        error: Option<DispatchError>,
    ) -> DispatchResult {
        self.advance(DispatchState::Settled(outcome));

        DispatchResult {
            notification_id: self.notification_id,
            channel: self.channel,
            labels: self.labels,
            outcome,
            delivery_status,
            attempts: self.attempts,
            delivery: self.delivery,
            validation: self.validation,
            history: self.history,
            error,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}

#[derive(Default)]
pub struct DispatchCoordinatorBuilder {
    adapters: AdapterRegistry,
    schemas: Option<Arc<SchemaStore>>,
    status_store: Option<Arc<dyn DeliveryStatusStore>>,
    settings: DispatchSettings,
}

impl DispatchCoordinatorBuilder {
    pub fn adapter(mut self, adapter: Arc<dyn ChannelAdapter>) -> Self {
        self.adapters.register(adapter);
        self
    }

    pub fn adapters(mut self, adapters: AdapterRegistry) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn schemas(mut self, schemas: Arc<SchemaStore>) -> Self {
        self.schemas = Some(schemas);
        self
    }

    pub fn status_store(mut self, store: Arc<dyn DeliveryStatusStore>) -> Self {
        self.status_store = Some(store);
        self
    }

    pub fn settings(mut self, settings: DispatchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Fails fast on missing bindings: a schema store, a status store, and at
    /// least one schema contract for every registered adapter are required.
    pub fn build(self) -> Result<DispatchCoordinator, DispatchError> {
        let schemas = self
            .schemas
            .ok_or_else(|| DispatchError::configuration("no schema store configured"))?;
        let status_store = self
            .status_store
            .ok_or_else(|| DispatchError::configuration("no delivery-status store configured"))?;

        if self.settings.verification.poll_interval.is_zero() {
            return Err(DispatchError::configuration(
                "poll interval must be greater than zero",
            ));
        }

        if let Some(channel) = self
            .adapters
            .channels()
            .into_iter()
            .find(|channel| !schemas.has_channel(*channel))
        {
            return Err(DispatchError::configuration(format!(
                "adapter registered for {} but no schema contract is loaded",
                channel
            )));
        }

        info!(
            channels = ?self.adapters.channels(),
            max_attempts = self.settings.retry_policy.max_attempts(),
            poll_interval_ms = self.settings.verification.poll_interval.as_millis() as u64,
            deadline_ms = self.settings.verification.deadline.as_millis() as u64,
            "Dispatch coordinator ready"
        );

        Ok(DispatchCoordinator {
            adapters: self.adapters,
            validator: SchemaValidator::new(schemas),
            verifier: DeliveryVerifier::new(status_store, self.settings.verification),
            settings: self.settings,
            in_flight: InFlightRegistry::default(),
        })
    }
}
