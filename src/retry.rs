use std::future::Future;

use tokio::time::{Duration, sleep};
use tracing::{debug, info, warn};

use crate::models::{attempt::DispatchAttempt, retry::BackoffKind, retry::RetryPolicy};

/// Jitter spreads each delay uniformly over `[1 - JITTER_RATIO, 1 + JITTER_RATIO]`.
pub const JITTER_RATIO: f64 = 0.2;

impl RetryPolicy {
    /// Delay before the attempt following `attempt_number`, without jitter.
    ///
    /// `Fixed` always yields the base delay; `Exponential` yields
    /// `base_delay * 2^(attempt_number - 1)`, saturating, then capped by
    /// `max_delay` when one is set.
    pub fn base_delay_for(&self, attempt_number: u32) -> Duration {
        let delay = match self.backoff_kind() {
            BackoffKind::Fixed => self.base_delay(),
            BackoffKind::Exponential => {
                let exponent = attempt_number.saturating_sub(1);
                if exponent >= u32::BITS {
                    Duration::MAX
                } else {
                    self.base_delay()
                        .checked_mul(1u32 << exponent)
                        .unwrap_or(Duration::MAX)
                }
            }
        };

        match self.max_delay() {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    pub fn next_delay(&self, attempt_number: u32) -> Duration {
        let delay = self.base_delay_for(attempt_number);

        if self.jitter() {
            apply_jitter(delay)
        } else {
            delay
        }
    }

    pub fn should_retry(&self, attempt_number: u32, last_outcome: &DispatchAttempt) -> bool {
        if attempt_number >= self.max_attempts() || last_outcome.succeeded() {
            return false;
        }

        last_outcome
            .error_detail
            .as_ref()
            .is_none_or(|error| error.is_retryable())
    }
}

pub fn apply_jitter(delay: Duration) -> Duration {
    let factor = 1.0 + rand::random_range(-JITTER_RATIO..=JITTER_RATIO);

    Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(delay)
}

/// Runs `operation` until it succeeds or the policy's attempts run out.
///
/// Every error is treated as retryable; callers that need failure classes
/// drive [`RetryPolicy::should_retry`] themselves.
pub async fn retry_with_backoff<F, Fut, T, E>(policy: &RetryPolicy, operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    info!(
                        attempt,
                        max_attempts = policy.max_attempts(),
                        "Retry succeeded"
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                if attempt >= policy.max_attempts() {
                    warn!(
                        max_attempts = policy.max_attempts(),
                        error = %e,
                        "Retry failed after exhausting all attempts"
                    );
                    return Err(e);
                }

                let delay = policy.next_delay(attempt);

                debug!(
                    attempt,
                    max_attempts = policy.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "Retry attempt failed, backing off"
                );

                sleep(delay).await;
            }
        }
    }
}
