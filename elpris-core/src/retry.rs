//! Bounded retry with exponential backoff.
//!
//! The delay before attempt `n` (n >= 2) is `base_delay * 2^(n-2)`, optionally
//! scaled by a random jitter factor in `[1 - jitter, 1 + jitter]`. Every error
//! is retried by default; [`retry_with_backoff_if`] layers a predicate on top
//! for callers that know some failures are permanent.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

/// Per-call retry configuration. Not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each attempt after.
    pub base_delay: Duration,
    /// Relative jitter applied to each delay, in `[0, 1)`.
    pub jitter: f64,
    /// No retry is scheduled if its delay would end after this instant.
    pub deadline: Option<Instant>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

impl RetryPolicy {
    /// Pure exponential policy without jitter or deadline.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            jitter: 0.0,
            deadline: None,
        }
    }

    /// Set the relative jitter, clamped to `[0, 0.99]`.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = if jitter.is_finite() {
            jitter.clamp(0.0, 0.99)
        } else {
            0.0
        };
        self
    }

    /// Bound the whole retry sequence by a deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Effective attempt count.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Nominal (unjittered) delay before the given 1-based attempt.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 2).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 || delay.is_zero() {
            return delay;
        }
        let factor = rand::rng().random_range((1.0 - self.jitter)..=(1.0 + self.jitter));
        delay.mul_f64(factor)
    }
}

/// Run `operation` until it succeeds or the policy is exhausted.
///
/// The error from the final attempt is returned unchanged.
pub async fn retry_with_backoff<T, E, F, Fut>(operation: F, policy: &RetryPolicy) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    retry_with_backoff_if(operation, policy, |_| true).await
}

/// Like [`retry_with_backoff`], but stops at the first error for which
/// `should_retry` returns false.
pub async fn retry_with_backoff_if<T, E, F, Fut, P>(
    mut operation: F,
    policy: &RetryPolicy,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if attempt >= attempts {
            tracing::warn!(attempt, max_attempts = attempts, error = %err, "Retries exhausted");
            return Err(err);
        }
        if !should_retry(&err) {
            tracing::debug!(attempt, error = %err, "Error is not retryable");
            return Err(err);
        }

        let delay = policy.jittered(policy.delay_before(attempt + 1));
        if let Some(deadline) = policy.deadline {
            if Instant::now() + delay > deadline {
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retry deadline reached"
                );
                return Err(err);
            }
        }

        tracing::warn!(
            attempt,
            max_attempts = attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Attempt failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
