use std::sync::Arc;

use anyhow::{Result, anyhow};
use delivery_service::{
    clients::{
        schema_store::SchemaStore, status_store::InMemoryStatusStore, stub::StubChannelAdapter,
    },
    coordinator::{DispatchCoordinator, DispatchSettings},
    models::{
        channel::Channel,
        request::{NotificationRequest, Payload},
        retry::RetryPolicy,
    },
    verifier::VerificationSettings,
};
use serde_json::{Value, json};
use tokio::time::Duration;

pub fn payload(value: Value) -> Result<Payload> {
    value
        .as_object()
        .cloned()
        .ok_or_else(|| anyhow!("test payload must be a JSON object"))
}

pub fn slack_payload() -> Value {
    json!({
        "text": "Deploy finished",
        "channel": "#releases",
        "blocks": [{ "type": "section" }]
    })
}

pub fn jira_payload() -> Value {
    json!({
        "project": { "key": "OPS" },
        "summary": "Disk usage above 90%",
        "issuetype": { "name": "Incident" }
    })
}

pub fn valid_payload(channel: Channel) -> Value {
    match channel {
        Channel::Slack => slack_payload(),
        Channel::Jira => jira_payload(),
        Channel::Email => json!({
            "to": ["oncall@example.com"],
            "subject": "Disk usage",
            "body": "Disk usage above 90%"
        }),
        Channel::Webhook => json!({ "event": "disk.usage", "data": { "percent": 91 } }),
        Channel::S3 => json!({ "key": "reports/disk.json", "content": { "percent": 91 } }),
        Channel::ServiceNow => json!({ "short_description": "Disk usage above 90%", "urgency": 2 }),
    }
}

pub fn request(id: &str, channel: Channel) -> Result<NotificationRequest> {
    Ok(NotificationRequest::new(
        id,
        channel,
        payload(valid_payload(channel))?,
    ))
}

pub fn unique_id(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4())
}

/// Poll every 2s, give up after 20s, retry up to 3 times with fixed 1s delay.
pub fn settings() -> Result<DispatchSettings> {
    Ok(DispatchSettings {
        retry_policy: RetryPolicy::fixed(3, Duration::from_secs(1))?,
        verification: VerificationSettings::new(Duration::from_secs(2), Duration::from_secs(20))?,
        worker_concurrency: 4,
    })
}

pub fn coordinator(
    adapters: &[Arc<StubChannelAdapter>],
    store: Arc<InMemoryStatusStore>,
    settings: DispatchSettings,
) -> Result<DispatchCoordinator> {
    let mut builder = DispatchCoordinator::builder()
        .schemas(Arc::new(SchemaStore::builtin()?))
        .status_store(store)
        .settings(settings);

    for adapter in adapters {
        builder = builder.adapter(adapter.clone());
    }

    Ok(builder.build()?)
}

/// Single stub adapter, fresh in-memory store, default test settings.
pub fn stub_coordinator(adapter: &Arc<StubChannelAdapter>) -> Result<DispatchCoordinator> {
    coordinator(
        std::slice::from_ref(adapter),
        Arc::new(InMemoryStatusStore::new()),
        settings()?,
    )
}
