use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::{
    coordinator::DispatchSettings,
    models::{
        channel::Channel,
        error::DispatchError,
        retry::{BackoffKind, RetryPolicy},
    },
    verifier::VerificationSettings,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterMode {
    /// Real HTTP adapters for every channel with a configured base URL.
    Http,
    /// In-process stub adapters with a simulated delivery consumer.
    Stub,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEndpoint {
    pub base_url: String,
    pub token: Option<String>,
}

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,

    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    #[serde(default = "default_backoff_kind")]
    pub retry_backoff_kind: String,
    #[serde(default = "default_initial_retry_delay_ms")]
    pub initial_retry_delay_ms: u64,
    #[serde(default)]
    pub max_retry_delay_ms: Option<u64>,
    #[serde(default = "default_true")]
    pub retry_jitter: bool,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_verify_deadline_ms")]
    pub verify_deadline_ms: u64,

    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    #[serde(default = "default_adapter_mode")]
    pub adapter_mode: String,
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,

    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_delivery_status_ttl_seconds")]
    pub delivery_status_ttl_seconds: u64,

    #[serde(default)]
    pub schema_dir: Option<String>,

    #[serde(default)]
    pub slack_base_url: Option<String>,
    #[serde(default)]
    pub slack_token: Option<String>,
    #[serde(default)]
    pub jira_base_url: Option<String>,
    #[serde(default)]
    pub jira_token: Option<String>,
    #[serde(default)]
    pub email_base_url: Option<String>,
    #[serde(default)]
    pub email_token: Option<String>,
    #[serde(default)]
    pub webhook_base_url: Option<String>,
    #[serde(default)]
    pub webhook_token: Option<String>,
    #[serde(default)]
    pub s3_base_url: Option<String>,
    #[serde(default)]
    pub s3_token: Option<String>,
    #[serde(default)]
    pub servicenow_base_url: Option<String>,
    #[serde(default)]
    pub servicenow_token: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|e| anyhow!("Invalid or missing environmental variable: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Builds a config from explicit `(NAME, value)` pairs instead of the
    /// process environment.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let config = envy::from_iter::<_, Self>(
            vars.into_iter().map(|(k, v)| (k.into(), v.into())),
        )
        .map_err(|e| anyhow!("Invalid configuration: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every derived setting once so bad values fail at startup.
    pub fn validate(&self) -> Result<(), Error> {
        self.dispatch_settings()?;
        self.adapter_mode()?;
        Ok(())
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy, DispatchError> {
        let backoff_kind = self.retry_backoff_kind.parse::<BackoffKind>()?;

        let mut policy = RetryPolicy::new(
            self.max_retry_attempts,
            backoff_kind,
            Duration::from_millis(self.initial_retry_delay_ms),
        )?
        .with_jitter(self.retry_jitter);

        if let Some(max_delay_ms) = self.max_retry_delay_ms {
            policy = policy.with_max_delay(Duration::from_millis(max_delay_ms));
        }

        Ok(policy)
    }

    pub fn verification_settings(&self) -> Result<VerificationSettings, DispatchError> {
        VerificationSettings::new(
            Duration::from_millis(self.poll_interval_ms),
            Duration::from_millis(self.verify_deadline_ms),
        )
    }

    pub fn dispatch_settings(&self) -> Result<DispatchSettings, DispatchError> {
        if self.worker_concurrency == 0 {
            return Err(DispatchError::configuration(
                "worker concurrency must be at least 1",
            ));
        }

        Ok(DispatchSettings {
            retry_policy: self.retry_policy()?,
            verification: self.verification_settings()?,
            worker_concurrency: self.worker_concurrency,
        })
    }

    pub fn adapter_mode(&self) -> Result<AdapterMode, DispatchError> {
        match self.adapter_mode.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(AdapterMode::Http),
            "stub" => Ok(AdapterMode::Stub),
            other => Err(DispatchError::configuration(format!(
                "unknown adapter mode '{}', expected 'http' or 'stub'",
                other
            ))),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    pub fn channel_endpoint(&self, channel: Channel) -> Option<ChannelEndpoint> {
        let (base_url, token) = match channel {
            Channel::Slack => (&self.slack_base_url, &self.slack_token),
            Channel::Jira => (&self.jira_base_url, &self.jira_token),
            Channel::Email => (&self.email_base_url, &self.email_token),
            Channel::Webhook => (&self.webhook_base_url, &self.webhook_token),
            Channel::S3 => (&self.s3_base_url, &self.s3_token),
            Channel::ServiceNow => (&self.servicenow_base_url, &self.servicenow_token),
        };

        base_url
            .as_ref()
            .filter(|url| !url.trim().is_empty())
            .map(|url| ChannelEndpoint {
                base_url: url.clone(),
                token: token.clone(),
            })
    }
}

fn default_environment() -> String {
    "local".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_backoff_kind() -> String {
    "exponential".to_string()
}

fn default_initial_retry_delay_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_verify_deadline_ms() -> u64 {
    20_000
}

fn default_worker_concurrency() -> usize {
    8
}

fn default_adapter_mode() -> String {
    "http".to_string()
}

fn default_http_timeout_seconds() -> u64 {
    10
}

fn default_delivery_status_ttl_seconds() -> u64 {
    86_400
}
