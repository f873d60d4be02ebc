use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    clients::schema_store::SchemaStore,
    models::{
        channel::Channel,
        error::DispatchError,
        request::{NotificationRequest, SubmitOptions},
        schema::ValidationResult,
    },
};

/// Checks payloads against the schema contract of their channel.
///
/// Holds no mutable state; one instance is shared by every dispatch.
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    store: Arc<SchemaStore>,
}

impl SchemaValidator {
    pub fn new(store: Arc<SchemaStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SchemaStore {
        &self.store
    }

    /// Validates `payload` against the contract for `(channel, version)`.
    ///
    /// With `bypass` set no contract is resolved and nothing is checked; the
    /// call is logged as intentionally unvalidated. An unknown contract is an
    /// `Err`, a payload that fails the contract is an `Ok` with violations.
    pub fn validate(
        &self,
        channel: Channel,
        version: Option<&str>,
        payload: &Value,
        bypass: bool,
    ) -> Result<ValidationResult, DispatchError> {
        if bypass {
            warn!(
                %channel,
                version = version.unwrap_or("latest"),
                "Schema validation bypassed, payload dispatched unvalidated"
            );
            return Ok(ValidationResult::bypassed());
        }

        let contract = self.store.resolve(channel, version)?;
        let violations = contract.check(payload);

        debug!(
            %channel,
            version = %contract.version(),
            violations = violations.len(),
            "Payload validated"
        );

        Ok(ValidationResult::checked(contract.version(), violations))
    }

    pub fn validate_request(
        &self,
        request: &NotificationRequest,
        options: &SubmitOptions,
    ) -> Result<ValidationResult, DispatchError> {
        if options.bypass_schema {
            warn!(
                notification_id = request.id(),
                owner = options.owner.as_deref().unwrap_or("unknown"),
                "Schema bypass requested"
            );
        }

        self.validate(
            request.channel(),
            request.schema_version(),
            &request.payload_value(),
            options.bypass_schema,
        )
    }
}
