//! Retry with exponential backoff.
//!
//! [`execute_with_retry`] drives any async send operation under a
//! [`RetryPolicy`]. A response whose status is retryable, or an error that is
//! [`Transient`], is retried after a backoff until attempts run out. When they
//! do, the last response (or error) is returned as-is, so callers always see
//! what the server actually said.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use rustore_common::{CallResult, RetryPolicy};

use crate::error::ClientError;

/// Waits between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync + fmt::Debug {
    /// Suspends the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records requested delays and returns immediately.
///
/// Clones share the same record.
#[derive(Debug, Default, Clone)]
pub struct RecordingSleeper {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delay requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
    }
}

/// A response carrying an HTTP status.
pub trait HasStatus {
    /// The HTTP status code.
    fn status_code(&self) -> u16;
}

impl HasStatus for CallResult {
    fn status_code(&self) -> u16 {
        self.status_code
    }
}

impl HasStatus for u16 {
    fn status_code(&self) -> u16 {
        *self
    }
}

/// An error that may succeed if the operation is repeated.
pub trait Transient {
    /// Whether another attempt is worthwhile.
    fn is_transient(&self) -> bool;
}

impl Transient for ClientError {
    fn is_transient(&self) -> bool {
        self.is_retryable()
    }
}

/// Runs `send` until it yields a non-retryable outcome or attempts run out.
///
/// `send` receives the one-based attempt number. The first attempt runs
/// immediately; retry `n` (zero-based) waits [`RetryPolicy::backoff_for`]`(n)`.
/// Non-transient errors are returned at once.
///
/// # Errors
///
/// Returns the error of the last attempt if it failed.
pub async fn execute_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut send: F,
) -> Result<T, E>
where
    T: HasStatus,
    E: Transient + fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let outcome = send(attempt).await;
        let retry_reason = match &outcome {
            Ok(response) if policy.is_retryable_status(response.status_code()) => {
                Some(format!("HTTP {}", response.status_code()))
            }
            Err(err) if err.is_transient() => Some(err.to_string()),
            _ => None,
        };
        let Some(retry_reason) = retry_reason else {
            return outcome;
        };

        if attempt >= max_attempts {
            warn!("Giving up after {attempt} attempt(s): {retry_reason}");
            return outcome;
        }

        let delay = policy.backoff_for(attempt - 1);
        debug!("Attempt {attempt}/{max_attempts} failed ({retry_reason}); retrying in {delay:?}");
        sleeper.sleep(delay).await;
        attempt += 1;
    }
}
