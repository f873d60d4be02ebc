use std::sync::Arc;

use anyhow::Result;
use delivery_service::{
    api::{AppState, router, status_for},
    config::Config,
    models::{
        channel::Channel,
        error::DispatchError,
        result::{DispatchResult, DispatchState, SettledOutcome},
        status::DeliveryStatus,
    },
};
use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::common::{jira_payload, slack_payload, unique_id};

async fn spawn_server() -> Result<String> {
    let config = Config::from_vars([
        ("ADAPTER_MODE", "stub"),
        ("POLL_INTERVAL_MS", "50"),
        ("VERIFY_DEADLINE_MS", "2000"),
        ("LOG_FORMAT", "pretty"),
    ])?;

    let state = Arc::new(AppState::from_config(&config).await?);
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        let _ = axum::serve(listener, router(state)).await;
    });

    Ok(format!("http://{}", addr))
}

/// Test: A valid synchronous notification is delivered
#[tokio::test]
async fn test_submit_valid_notification() -> Result<()> {
    let base = spawn_server().await?;
    let id = unique_id("api_slack");

    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/notifications", base))
        .json(&json!({
            "id": id,
            "channel": "slack",
            "payload": slack_payload(),
            "owner": "release-bot",
            "labels": { "team": "platform" }
        }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["notification_id"], id.as_str());
    assert_eq!(body["data"]["delivery_status"], "delivered");
    assert_eq!(body["data"]["attempts"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["data"]["labels"]["team"], "platform");

    Ok(())
}

/// Test: An asynchronous notification is verified through the status store
#[tokio::test]
async fn test_submit_async_notification_is_verified() -> Result<()> {
    let base = spawn_server().await?;

    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/notifications", base))
        .json(&json!({ "channel": "jira", "payload": jira_payload() }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await?;
    assert_eq!(body["data"]["delivery_status"], "delivered");
    assert_eq!(body["data"]["delivery"]["status"], "delivered");
    assert!(
        body["data"]["notification_id"].as_str().is_some_and(|id| !id.is_empty()),
        "A missing id is generated"
    );

    Ok(())
}

/// Test: Schema violations are reported with 422 and the violation paths
#[tokio::test]
async fn test_schema_violation_returns_422() -> Result<()> {
    let base = spawn_server().await?;

    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/notifications", base))
        .json(&json!({
            "channel": "slack",
            "schema_version": "v1",
            "payload": { "username": "bot" }
        }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: Value = response.json().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["error_kind"], "schema_violation");
    assert_eq!(body["data"]["error"]["kind"], "schema_violation");
    assert_eq!(body["data"]["error"]["violations"][0]["path"], "/text");

    Ok(())
}

/// Test: Bypass lets an invalid payload through the API
#[tokio::test]
async fn test_bypass_schema_over_api() -> Result<()> {
    let base = spawn_server().await?;

    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/notifications", base))
        .json(&json!({
            "channel": "webhook",
            "payload": {},
            "bypass_schema": true,
            "owner": "migration-job"
        }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await?;
    assert_eq!(body["data"]["validation"]["bypassed"], true);

    Ok(())
}

/// Test: Health reports every component
#[tokio::test]
async fn test_health_endpoint() -> Result<()> {
    let base = spawn_server().await?;

    let response = reqwest::get(format!("{}/health", base)).await?;

    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await?;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["delivery_status_store"]["detail"], "memory");
    assert_eq!(body["checks"]["schema_store"]["status"], "healthy");
    assert_eq!(body["checks"]["channel_adapters"]["status"], "healthy");

    Ok(())
}

/// Test: HTTP mode with no configured channels refuses to start
#[tokio::test]
async fn test_http_mode_without_channels_fails() -> Result<()> {
    let config = Config::from_vars([("ADAPTER_MODE", "http")])?;

    assert!(AppState::from_config(&config).await.is_err());

    Ok(())
}

fn settled_with(error: Option<DispatchError>) -> DispatchResult {
    DispatchResult {
        notification_id: "n-status".to_string(),
        channel: Channel::Webhook,
        labels: Default::default(),
        outcome: if error.is_some() {
            SettledOutcome::Failure
        } else {
            SettledOutcome::Success
        },
        delivery_status: DeliveryStatus::Failed,
        attempts: Vec::new(),
        delivery: None,
        validation: None,
        history: vec![DispatchState::Created],
        error,
        elapsed_ms: 0,
    }
}

/// Test: Each error kind maps to its HTTP status
#[test]
fn test_status_mapping() {
    let cases = [
        (None, StatusCode::OK),
        (
            Some(DispatchError::AlreadyInFlight {
                notification_id: "n".to_string(),
            }),
            StatusCode::CONFLICT,
        ),
        (
            Some(DispatchError::configuration("no adapter")),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
        (
            Some(DispatchError::VerificationTimeout { deadline_ms: 20_000 }),
            StatusCode::GATEWAY_TIMEOUT,
        ),
        (
            Some(DispatchError::TerminalSend {
                status: Some(403),
                message: "forbidden".to_string(),
            }),
            StatusCode::BAD_GATEWAY,
        ),
        (
            Some(DispatchError::DeliveryRejected {
                trace_id: "t".to_string(),
            }),
            StatusCode::BAD_GATEWAY,
        ),
    ];

    for (error, expected) in cases {
        assert_eq!(status_for(&settled_with(error)).as_u16(), expected.as_u16());
    }
}
