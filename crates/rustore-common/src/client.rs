//! Request parameters, call results and retry configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use typed_builder::TypedBuilder;

/// HTTP statuses that are retried by default.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Retry behaviour for a single logical send.
///
/// The first attempt is sent immediately. After attempt `n` fails with a
/// transport error or a retryable status, the sender waits
/// `initial_backoff * backoff_multiplier^(n - 1)` before trying again, until
/// `max_attempts` attempts have been made.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rustore_common::RetryPolicy;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_attempts, 3);
/// assert_eq!(policy.backoff_for(0), Duration::from_millis(500));
/// assert_eq!(policy.backoff_for(1), Duration::from_secs(1));
/// assert!(policy.is_retryable_status(503));
/// assert!(!policy.is_retryable_status(404));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Factor applied to the delay after every retry.
    pub backoff_multiplier: f64,
    /// Statuses that trigger another attempt.
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// A policy that sends exactly once.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Sets the total number of attempts. Values below one are treated as one.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets the delay before the first retry.
    #[must_use]
    pub const fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub const fn with_backoff_multiplier(mut self, backoff_multiplier: f64) -> Self {
        self.backoff_multiplier = backoff_multiplier;
        self
    }

    /// Replaces the set of retryable statuses.
    #[must_use]
    pub fn with_retryable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_statuses = statuses.into_iter().collect();
        self
    }

    /// Whether a response with `status` should be retried.
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Delay before retry number `retry` (zero based).
    ///
    /// Saturates at [`Duration::MAX`] instead of overflowing.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let factor = self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(self.initial_backoff.as_secs_f64() * factor)
            .unwrap_or(Duration::MAX)
    }
}

/// Parameters for one API call.
///
/// `path` values fill `{placeholder}`s in the path template, `query` values
/// are sent as the query string, and `body` is sent as JSON.
///
/// # Examples
///
/// ```
/// use rustore_common::CallParams;
/// use serde_json::{Map, json};
///
/// let mut path = Map::new();
/// path.insert("packageName".to_string(), json!("com.example.app"));
///
/// let params = CallParams::builder()
///     .path(path)
///     .body(json!({"appName": "Example"}))
///     .build();
/// assert!(params.query.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, TypedBuilder)]
pub struct CallParams {
    /// Values substituted into the path template.
    #[builder(default)]
    pub path: Map<String, Value>,
    /// Query string values. Null, empty-string and empty-list values are not sent.
    #[builder(default)]
    pub query: Map<String, Value>,
    /// JSON request body.
    #[builder(default, setter(strip_option))]
    pub body: Option<Value>,
}

/// Outcome of an API call as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallResult {
    /// HTTP status code.
    pub status_code: u16,
    /// Response headers. Repeated headers are joined with `", "`.
    pub headers: BTreeMap<String, String>,
    /// Raw response body.
    pub body_text: String,
}

impl CallResult {
    /// Creates a result with no headers.
    pub fn new(status_code: u16, body_text: impl Into<String>) -> Self {
        Self {
            status_code,
            headers: BTreeMap::new(),
            body_text: body_text.into(),
        }
    }

    /// Whether the status is in the 2xx range.
    pub const fn is_success(&self) -> bool {
        self.status_code >= 200 && self.status_code < 300
    }

    /// Whether the status signals an expired or rejected token.
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self.status_code, 401 | 403)
    }

    /// Parses the body as JSON, if it is JSON.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body_text).ok()
    }

    /// Pretty-printed JSON body, or the raw text when the body is not JSON.
    pub fn pretty_body(&self) -> String {
        self.json()
            .and_then(|value| serde_json::to_string_pretty(&value).ok())
            .unwrap_or_else(|| self.body_text.clone())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use serde_json::json;

    use super::*;

    #[test]
    fn test_default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_backoff, Duration::from_millis(500));
        for status in [429, 500, 502, 503, 504] {
            assert!(policy.is_retryable_status(status));
        }
        for status in [200, 201, 400, 401, 403, 404, 501] {
            assert!(!policy.is_retryable_status(status));
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(0), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(2000));
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy::default().with_initial_backoff(Duration::from_secs(u64::MAX));
        assert_eq!(policy.backoff_for(u32::MAX), Duration::MAX);
    }

    #[test]
    fn test_max_attempts_floor() {
        assert_eq!(RetryPolicy::default().with_max_attempts(0).max_attempts, 1);
        assert_eq!(RetryPolicy::no_retry().max_attempts, 1);
    }

    #[test]
    fn test_call_result_helpers() {
        let ok = CallResult::new(200, r#"{"code":"OK","body":{"id":1}}"#);
        assert!(ok.is_success());
        assert!(!ok.is_auth_failure());
        assert_eq!(ok.json().unwrap()["body"]["id"], json!(1));
        assert!(ok.pretty_body().contains("\n"));

        let denied = CallResult::new(403, "forbidden");
        assert!(denied.is_auth_failure());
        assert!(denied.json().is_none());
        assert_eq!(denied.pretty_body(), "forbidden");
    }

    #[test]
    fn test_call_params_builder_defaults() {
        let params = CallParams::builder().build();
        assert!(params.path.is_empty());
        assert!(params.query.is_empty());
        assert!(params.body.is_none());
        assert_eq!(params, CallParams::default());
    }
}
