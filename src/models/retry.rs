use std::{str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::models::error::DispatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

impl FromStr for BackoffKind {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(BackoffKind::Fixed),
            "exponential" => Ok(BackoffKind::Exponential),
            other => Err(DispatchError::configuration(format!(
                "unknown backoff kind '{}', expected 'fixed' or 'exponential'",
                other
            ))),
        }
    }
}

/// Retry configuration bound to a dispatch.
///
/// Built through constructors that reject `max_attempts == 0`; there are no
/// setters once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_kind: BackoffKind,
    base_delay: Duration,
    jitter: bool,
    max_delay: Option<Duration>,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        backoff_kind: BackoffKind,
        base_delay: Duration,
    ) -> Result<Self, DispatchError> {
        if max_attempts == 0 {
            return Err(DispatchError::configuration(
                "retry policy requires max_attempts >= 1",
            ));
        }

        Ok(Self {
            max_attempts,
            backoff_kind,
            base_delay,
            jitter: false,
            max_delay: None,
        })
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Result<Self, DispatchError> {
        Self::new(max_attempts, BackoffKind::Fixed, delay)
    }

    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Result<Self, DispatchError> {
        Self::new(max_attempts, BackoffKind::Exponential, base_delay)
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff_kind(&self) -> BackoffKind {
        self.backoff_kind
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn jitter(&self) -> bool {
        self.jitter
    }

    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_kind: BackoffKind::Exponential,
            base_delay: Duration::from_millis(500),
            jitter: true,
            max_delay: None,
        }
    }
}
