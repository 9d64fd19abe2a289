//! Retry with exponential backoff for source operations

use std::time::Duration;

use crate::cancel::CancelToken;
use crate::error::{RetryError, SourceError};

/// Bounded-retry policy: `max_attempts` total invocations, sleeping
/// `backoff_base * 2^attempt` seconds after each retryable failure.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: 2.0,
        }
    }
}

/// Exponential backoff for a zero-based attempt index.
pub fn backoff_duration(policy: &RetryPolicy, attempt: u32) -> Duration {
    Duration::from_secs_f64(policy.backoff_base * 2f64.powi(attempt as i32))
}

/// Run `op` under `policy`, checking the cancellation token before every
/// attempt (including the first — a set token never consumes an attempt).
///
/// Retryable errors are warn-logged and retried after the backoff sleep;
/// non-retryable errors propagate immediately as [`RetryError::Fatal`].
/// `max_attempts = N` means N invocations of `op`, not N retries beyond
/// the first.
pub fn with_retry<T>(
    policy: &RetryPolicy,
    token: &CancelToken,
    label: &str,
    op: impl FnMut() -> Result<T, SourceError>,
) -> Result<T, RetryError> {
    run(policy, token, label, op, std::thread::sleep)
}

fn run<T>(
    policy: &RetryPolicy,
    token: &CancelToken,
    label: &str,
    mut op: impl FnMut() -> Result<T, SourceError>,
    mut sleep: impl FnMut(Duration),
) -> Result<T, RetryError> {
    let mut last: Option<SourceError> = None;
    for attempt in 0..policy.max_attempts {
        if token.is_cancelled() {
            log::info!("{label}: cancellation requested, abandoning attempts");
            return Err(RetryError::Cancelled);
        }
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() => {
                let wait = backoff_duration(policy, attempt);
                log::warn!(
                    "{label}: attempt {}/{} failed: {e}, retrying in {:.1}s",
                    attempt + 1,
                    policy.max_attempts,
                    wait.as_secs_f64()
                );
                last = Some(e);
                sleep(wait);
            }
            Err(e) => {
                log::error!("{label}: non-retryable failure: {e}");
                return Err(RetryError::Fatal(e));
            }
        }
    }
    log::error!("{label}: giving up after {} attempts", policy.max_attempts);
    Err(RetryError::Exhausted(last.unwrap_or_else(|| {
        SourceError::Transient("no attempts were executed".into())
    })))
}
