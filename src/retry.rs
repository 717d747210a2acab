//! Bounded exponential-backoff retry engine
//!
//! Wraps a fallible async operation with a retry budget, a classification
//! predicate and a cancellation signal. The flush pipeline uses it around
//! the batched write; nothing in here knows about samples or stores.

use std::cmp;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Retry budget and backoff shape
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum retries after the initial attempt
    pub attempts: usize,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Cap on the doubling delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Run `op` with bounded exponential-backoff retry
///
/// The operation executes at most `policy.attempts + 1` times. The delay
/// before each retry doubles, capped at `policy.max_delay`. Before each
/// retry the `retryable` predicate is consulted; a false verdict ends the
/// loop immediately regardless of remaining budget. Cancelling `token`
/// interrupts a backoff sleep and returns the last error. Every retry
/// increments `retries`.
pub async fn with_backoff<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    token: &CancellationToken,
    retries: &AtomicU64,
    retryable: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let mut delay = policy.base_delay;
    let mut attempt = 0usize;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.attempts {
                    return Err(err);
                }
                if !retryable(&err) {
                    tracing::debug!(error = %err, "error is not retryable, giving up");
                    return Err(err);
                }

                attempt += 1;
                retries.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    error = %err,
                    attempt,
                    max_attempts = policy.attempts,
                    delay_ms = delay.as_millis() as u64,
                    "operation failed, retrying"
                );

                tokio::select! {
                    _ = token.cancelled() => return Err(err),
                    _ = tokio::time::sleep(delay) => {}
                }
                delay = cmp::min(delay.saturating_mul(2), policy.max_delay);
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_test.rs"]
mod retry_test;
