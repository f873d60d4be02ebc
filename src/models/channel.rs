use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Slack,
    Jira,
    Email,
    Webhook,
    S3,
    ServiceNow,
}

/// How a channel acknowledges a send.
///
/// Synchronous channels confirm delivery in the send response itself.
/// Asynchronous channels only accept the request; delivery shows up later
/// in the delivery-status store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    Synchronous,
    Asynchronous,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown channel '{0}'")]
pub struct UnknownChannel(pub String);

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::Slack,
        Channel::Jira,
        Channel::Email,
        Channel::Webhook,
        Channel::S3,
        Channel::ServiceNow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Slack => "slack",
            Channel::Jira => "jira",
            Channel::Email => "email",
            Channel::Webhook => "webhook",
            Channel::S3 => "s3",
            Channel::ServiceNow => "servicenow",
        }
    }

    pub fn ack_mode(&self) -> AckMode {
        match self {
            Channel::Slack | Channel::Webhook | Channel::S3 => AckMode::Synchronous,
            Channel::Jira | Channel::Email | Channel::ServiceNow => AckMode::Asynchronous,
        }
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slack" => Ok(Channel::Slack),
            "jira" => Ok(Channel::Jira),
            "email" => Ok(Channel::Email),
            "webhook" => Ok(Channel::Webhook),
            "s3" => Ok(Channel::S3),
            "servicenow" | "service_now" => Ok(Channel::ServiceNow),
            _ => Err(UnknownChannel(s.to_string())),
        }
    }
}
