use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{channel::Channel, retry::RetryPolicy};

pub type Payload = Map<String, Value>;

/// A notification addressed to one channel.
///
/// Fields are private: once built, a request is never mutated. The `with_*`
/// methods consume the value and are meant for construction only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    id: String,
    channel: Channel,
    payload: Payload,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    schema_version: Option<String>,

    created_at: DateTime<Utc>,
}

impl NotificationRequest {
    pub fn new(id: impl Into<String>, channel: Channel, payload: Payload) -> Self {
        Self {
            id: id.into(),
            channel,
            payload,
            schema_version: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_schema_version(mut self, version: impl Into<String>) -> Self {
        self.schema_version = Some(version.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn payload_value(&self) -> Value {
        Value::Object(self.payload.clone())
    }

    pub fn schema_version(&self) -> Option<&str> {
        self.schema_version.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Per-request metadata supplied alongside a [`NotificationRequest`].
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Skip schema validation for this call. Always logged.
    pub bypass_schema: bool,
    pub owner: Option<String>,
    pub labels: BTreeMap<String, String>,
    /// Overrides the coordinator's default policy for this dispatch only.
    pub retry_policy: Option<RetryPolicy>,
}

impl SubmitOptions {
    pub fn bypass_schema(mut self) -> Self {
        self.bypass_schema = true;
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }
}
