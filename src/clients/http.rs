use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::{
    clients::channel::ChannelAdapter,
    models::{
        channel::{AckMode, Channel},
        request::NotificationRequest,
        send::{SendError, SendResult},
    },
};

/// The HTTP call a channel adapter is about to make.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

/// Channel adapter that talks to the platform's HTTP API.
pub struct HttpChannelAdapter {
    channel: Channel,
    http_client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpChannelAdapter {
    pub fn new(
        channel: Channel,
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client for {}: {}", channel, e))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();

        info!(%channel, base_url = %base_url, "Channel adapter initialized");

        Ok(Self {
            channel,
            http_client,
            base_url,
            token,
        })
    }

    pub fn build_request(&self, request: &NotificationRequest) -> OutboundRequest {
        let payload = request.payload_value();

        let (method, url, body) = match self.channel {
            Channel::Slack => (Method::POST, self.base_url.clone(), payload),
            Channel::Webhook => (
                Method::POST,
                self.base_url.clone(),
                json!({
                    "id": request.id(),
                    "created_at": request.created_at().to_rfc3339(),
                    "data": payload,
                }),
            ),
            Channel::S3 => {
                let key = request
                    .payload()
                    .get("key")
                    .and_then(Value::as_str)
                    .map(|key| key.trim_start_matches('/').to_string())
                    .unwrap_or_else(|| format!("{}.json", request.id()));
                (Method::PUT, format!("{}/{}", self.base_url, key), payload)
            }
            Channel::Jira => (
                Method::POST,
                format!("{}/rest/api/2/issue", self.base_url),
                json!({ "fields": payload }),
            ),
            Channel::Email => (
                Method::POST,
                format!("{}/v1/messages", self.base_url),
                with_field(payload, "message_id", request.id()),
            ),
            Channel::ServiceNow => (
                Method::POST,
                format!("{}/api/now/table/incident", self.base_url),
                with_field(payload, "correlation_id", request.id()),
            ),
        };

        let mut headers = vec![("X-Notification-Id".to_string(), request.id().to_string())];
        if let Some(token) = &self.token {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }

        OutboundRequest {
            method,
            url,
            headers,
            body,
        }
    }
}

#[async_trait]
impl ChannelAdapter for HttpChannelAdapter {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, request: &NotificationRequest) -> SendResult {
        let outbound = self.build_request(request);

        debug!(
            channel = %self.channel,
            notification_id = request.id(),
            method = %outbound.method,
            url = %outbound.url,
            "Sending notification"
        );

        let mut builder = self
            .http_client
            .request(outbound.method.clone(), &outbound.url)
            .json(&outbound.body);
        for (name, value) in &outbound.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(channel = %self.channel, error = %e, "Channel request failed");
                return SendResult::failed(
                    SendError::transient(format!("network error: {}", e)),
                    None,
                    String::new(),
                );
            }
        };

        let status = response.status().as_u16();
        // The status line alone decides the outcome when the body is unreadable.
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(
                    channel = %self.channel,
                    status,
                    error = %e,
                    "Failed to read response body"
                );
                String::new()
            }
        };

        if !(200..300).contains(&status) {
            warn!(channel = %self.channel, status, "Channel rejected notification");
            let error = SendError::from_status(status, &body);
            return SendResult::failed(error, Some(status), body);
        }

        match self.channel.ack_mode() {
            AckMode::Synchronous => SendResult::delivered(status, body),
            AckMode::Asynchronous if body.trim().is_empty() => {
                debug!(
                    channel = %self.channel,
                    status,
                    "Empty acknowledgment, tracking by notification id"
                );
                SendResult::accepted(status, body, request.id().to_string())
            }
            AckMode::Asynchronous => {
                let tracking_id = match extract_tracking_id(&body) {
                    Ok(tracking_id) => tracking_id.unwrap_or_else(|| request.id().to_string()),
                    Err(e) => {
                        // Already accepted upstream: report it, never resend it.
                        warn!(
                            channel = %self.channel,
                            status,
                            error = %e,
                            "Malformed acknowledgment for an accepted notification"
                        );
                        return SendResult::failed(
                            SendError::terminal(format!("malformed acknowledgment: {}", e)),
                            Some(status),
                            body,
                        );
                    }
                };
                debug!(
                    channel = %self.channel,
                    tracking_id = %tracking_id,
                    "Notification accepted"
                );
                SendResult::accepted(status, body, tracking_id)
            }
        }
    }
}

/// Pulls the delivery tracking key out of an asynchronous acknowledgment.
///
/// Fails when the body is not JSON. Recognized keys, in order: `trace_id`, `key`, `id`,
/// `message_id`, `result.sys_id`.
pub fn extract_tracking_id(body: &str) -> Result<Option<String>, serde_json::Error> {
    let ack = serde_json::from_str::<Value>(body)?;

    let candidates = [
        ack.get("trace_id"),
        ack.get("key"),
        ack.get("id"),
        ack.get("message_id"),
        ack.pointer("/result/sys_id"),
    ];

    Ok(candidates.into_iter().flatten().find_map(|value| match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }))
}

fn with_field(payload: Value, name: &str, value: &str) -> Value {
    match payload {
        Value::Object(mut map) => {
            map.entry(name.to_string())
                .or_insert_with(|| Value::String(value.to_string()));
            Value::Object(map)
        }
        other => other,
    }
}
