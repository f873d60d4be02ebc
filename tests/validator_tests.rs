use std::{fs, sync::Arc};

use anyhow::Result;
use delivery_service::{
    clients::schema_store::SchemaStore,
    models::{
        channel::Channel,
        error::DispatchError,
        request::{NotificationRequest, SubmitOptions},
    },
    validator::SchemaValidator,
};
use serde_json::json;

use crate::common::{payload, valid_payload};

fn validator() -> Result<SchemaValidator> {
    Ok(SchemaValidator::new(Arc::new(SchemaStore::builtin()?)))
}

/// Test: Every built-in contract accepts a well-formed payload
#[test]
fn test_valid_payloads_pass_every_channel() -> Result<()> {
    let validator = validator()?;

    for channel in Channel::ALL {
        let result = validator.validate(channel, None, &valid_payload(channel), false)?;

        assert!(result.valid, "{} payload should be valid: {:?}", channel, result.violations);
        assert!(result.violations.is_empty());
        assert!(!result.bypassed);
    }

    Ok(())
}

/// Test: A missing required field is reported at its JSON pointer
#[test]
fn test_missing_required_field_reports_path() -> Result<()> {
    let validator = validator()?;

    let missing_text = json!({ "channel": "#ops" });
    let result = validator.validate(Channel::Slack, Some("v1"), &missing_text, false)?;

    assert!(!result.valid);
    assert_eq!(result.violations.len(), 1);
    assert_eq!(result.violations[0].path, "/text");
    assert_eq!(result.violations[0].reason, "missing required field");
    assert_eq!(result.version.as_deref(), Some("v1"));

    Ok(())
}

/// Test: Nested violations carry the nested instance path
#[test]
fn test_nested_violation_path() -> Result<()> {
    let validator = validator()?;

    let mut jira = valid_payload(Channel::Jira);
    jira["project"]["key"] = json!("lowercase");

    let result = validator.validate(Channel::Jira, None, &jira, false)?;

    assert!(!result.valid);
    assert!(
        result.violations.iter().any(|v| v.path == "/project/key"),
        "expected a violation at /project/key, got {:?}",
        result.violations
    );

    Ok(())
}

/// Test: Omitting the version resolves the channel's latest contract
#[test]
fn test_latest_version_is_default() -> Result<()> {
    let validator = validator()?;
    let text_only = json!({ "text": "hello" });

    let latest = validator.validate(Channel::Slack, None, &text_only, false)?;
    assert_eq!(latest.version.as_deref(), Some("v2"));
    assert!(!latest.valid, "v2 also requires blocks");
    assert!(latest.violations.iter().any(|v| v.path == "/blocks"));

    let pinned = validator.validate(Channel::Slack, Some("v1"), &text_only, false)?;
    assert!(pinned.valid);

    Ok(())
}

/// Test: Unknown contract versions are configuration errors
#[test]
fn test_unknown_version_is_configuration_error() -> Result<()> {
    let validator = validator()?;

    let result = validator.validate(Channel::Slack, Some("v9"), &json!({}), false);

    assert!(matches!(result, Err(DispatchError::Configuration { .. })));

    Ok(())
}

/// Test: Bypass skips validation even for an empty payload
#[test]
fn test_bypass_skips_validation() -> Result<()> {
    let validator = validator()?;

    let result = validator.validate(Channel::Jira, Some("v404"), &json!({}), true)?;

    assert!(result.valid);
    assert!(result.bypassed);
    assert!(result.version.is_none());

    let request = NotificationRequest::new("bypass-1", Channel::Email, payload(json!({}))?);
    let options = SubmitOptions::default().bypass_schema().with_owner("billing-team");
    let result = validator.validate_request(&request, &options)?;

    assert!(result.bypassed);

    Ok(())
}

/// Test: Contracts on disk extend and override the built-ins
#[test]
fn test_load_dir_adds_versions() -> Result<()> {
    let dir = std::env::temp_dir().join(format!("schemas_{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(dir.join("webhook"))?;
    fs::create_dir_all(dir.join("not-a-channel"))?;
    fs::write(
        dir.join("webhook").join("v3.json"),
        json!({
            "type": "object",
            "required": ["event", "data", "source"],
            "properties": { "source": { "type": "string" } }
        })
        .to_string(),
    )?;
    fs::write(dir.join("webhook").join("README.txt"), "ignored")?;

    let mut store = SchemaStore::builtin()?;
    let before = store.contract_count();
    let loaded = store.load_dir(&dir)?;

    assert_eq!(loaded, 1);
    assert_eq!(store.contract_count(), before + 1);
    assert_eq!(store.versions(Channel::Webhook), vec!["v1", "v3"]);

    let validator = SchemaValidator::new(Arc::new(store));
    let v1_event = valid_payload(Channel::Webhook);
    let result = validator.validate(Channel::Webhook, None, &v1_event, false)?;
    assert!(!result.valid);
    assert_eq!(result.violations[0].path, "/source");

    fs::remove_dir_all(&dir)?;

    Ok(())
}

/// Test: A schema document that does not compile is rejected
#[test]
fn test_invalid_schema_document_rejected() {
    let mut store = SchemaStore::new();

    let result = store.register(Channel::Slack, "v1", json!({ "type": 12 }));

    assert!(matches!(result, Err(DispatchError::Configuration { .. })));
    assert!(!store.has_channel(Channel::Slack));
}
