//! Exponential backoff with jitter for remote model calls.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::classify::is_rate_limited;

#[derive(Debug, Clone, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, first call included. Values below 1 are treated as 1.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    #[serde(skip, default = "default_retry_if")]
    pub retry_if: fn(&str) -> bool,
}

fn default_retry_if() -> fn(&str) -> bool {
    is_rate_limited
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            retry_if: is_rate_limited,
        }
    }

    /// Five retries at 400 ms.
    pub fn embedding() -> Self {
        Self::new(6, 400)
    }

    /// Four retries at 500 ms.
    pub fn generation() -> Self {
        Self::new(5, 500)
    }

    pub fn with_retry_if(mut self, retry_if: fn(&str) -> bool) -> Self {
        self.retry_if = retry_if;
        self
    }

    fn attempt_budget(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Why [`execute`] gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Error the policy does not retry.
    Fatal { error: E, attempts: u32 },
    /// Retryable error on the last permitted attempt.
    Exhausted { error: E, attempts: u32 },
    /// Cancellation observed while waiting to retry.
    Cancelled { error: E, attempts: u32 },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Fatal { attempts, .. }
            | RetryError::Exhausted { attempts, .. }
            | RetryError::Cancelled { attempts, .. } => *attempts,
        }
    }

    pub fn error(&self) -> &E {
        match self {
            RetryError::Fatal { error, .. }
            | RetryError::Exhausted { error, .. }
            | RetryError::Cancelled { error, .. } => error,
        }
    }

    pub fn into_error(self) -> E {
        match self {
            RetryError::Fatal { error, .. }
            | RetryError::Exhausted { error, .. }
            | RetryError::Cancelled { error, .. } => error,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Fatal { error, .. } => write!(f, "{error}"),
            RetryError::Exhausted { error, attempts } => {
                write!(f, "{error} (gave up after {attempts} attempts)")
            }
            RetryError::Cancelled { error, attempts } => {
                write!(f, "cancelled after {attempts} attempts; last error: {error}")
            }
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryError<E> {}

/// Runs `operation` until it succeeds, fails with an error the policy does not
/// retry, or the attempt budget is spent. Attempts never overlap.
pub async fn execute<F, Fut, T, E>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    execute_observed(policy, cancel, operation, |_, _, _| {}).await
}

/// [`execute`], calling `on_retry(failed_attempts, delay, &error)` before
/// each backoff sleep.
pub async fn execute_observed<F, Fut, T, E, H>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
    mut on_retry: H,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    H: FnMut(u32, Duration, &E),
{
    let budget = policy.attempt_budget();
    let mut attempt: u32 = 0;
    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        let attempts = attempt + 1;

        if !(policy.retry_if)(&error.to_string()) {
            return Err(RetryError::Fatal { error, attempts });
        }
        if attempts >= budget {
            return Err(RetryError::Exhausted { error, attempts });
        }

        let delay = backoff_delay(policy, attempt, &mut rand::thread_rng());
        warn!(
            "rate limit hit, retrying in {}ms (attempt {}/{})",
            delay.as_millis(),
            attempts,
            budget
        );
        on_retry(attempts, delay, &error);
        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(RetryError::Cancelled { error, attempts });
            }
            _ = tokio::time::sleep(delay) => {}
        }
        attempt = attempts;
    }
}

/// `base × 2^attempt × U[0.5, 1.0]`, `attempt` being the zero-based index of
/// the attempt that just failed.
pub fn backoff_delay<R: Rng + ?Sized>(policy: &RetryPolicy, attempt: u32, rng: &mut R) -> Duration {
    let exp = policy.base_delay_ms as f64 * 2f64.powi(attempt.min(62) as i32);
    let jitter: f64 = rng.gen_range(0.5..=1.0);
    Duration::from_millis((exp * jitter).round() as u64)
}
