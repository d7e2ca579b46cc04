//! Redacting request/response logging.
//!
//! The client writes one line per auth or API exchange to a pluggable
//! [`LogSink`]. Every payload passes through [`crate::redact`] first, so a sink
//! never sees a token, signature or key.
//!
//! Line formats:
//!
//! ```text
//! [AUTH][REQUEST] POST <url>\npayload=<json>
//! [AUTH][RESPONSE] <status>\nheaders=<json>\nbody=<text>
//! [AUTH][ERROR] <message>
//! [API][REQUEST] <METHOD> <url>\nheaders=<json>\nparams=<json>\nbody=<json>
//! [API][RESPONSE] <status>\nheaders=<json>\nbody=<text>
//! [API][ERROR] <METHOD> <url>: <message>
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use log::Level;
use rustore_common::CallResult;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::redact::{DEFAULT_MAX_LEN, abbreviate_signature, format_for_log, format_response_text};

/// Log target used by [`LogCrateSink`].
pub const LOG_TARGET: &str = "rustore::api";

/// Destination for formatted log lines.
pub trait LogSink: Send + Sync {
    /// Writes one (possibly multi-line) entry.
    fn emit(&self, line: &str);
}

/// Forwards entries to the `log` facade.
#[derive(Debug, Clone, Copy)]
pub struct LogCrateSink {
    level: Level,
}

impl LogCrateSink {
    /// Creates a sink logging at `level` under [`LOG_TARGET`].
    pub const fn new(level: Level) -> Self {
        Self { level }
    }
}

impl Default for LogCrateSink {
    fn default() -> Self {
        Self::new(Level::Info)
    }
}

impl LogSink for LogCrateSink {
    fn emit(&self, line: &str) {
        log::log!(target: LOG_TARGET, self.level, "{line}");
    }
}

/// Adapts a closure into a sink.
pub struct FnSink<F>(pub F);

impl<F> LogSink for FnSink<F>
where
    F: Fn(&str) + Send + Sync,
{
    fn emit(&self, line: &str) {
        (self.0)(line);
    }
}

/// Keeps every entry in memory. Useful for inspecting output in tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// All entries joined with newlines.
    pub fn joined(&self) -> String {
        self.lines().join("\n")
    }
}

impl LogSink for MemorySink {
    fn emit(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl LogSink for NoopSink {
    fn emit(&self, _line: &str) {}
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthPayloadLog<'a> {
    key_id: &'a str,
    timestamp: &'a str,
    signature: String,
}

/// Formats auth and API exchanges and hands them to a [`LogSink`].
#[derive(Clone)]
pub struct RedactingLogger {
    sink: Arc<dyn LogSink>,
    max_len: usize,
}

impl fmt::Debug for RedactingLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedactingLogger")
            .field("max_len", &self.max_len)
            .finish_non_exhaustive()
    }
}

impl Default for RedactingLogger {
    fn default() -> Self {
        Self::new(Arc::new(LogCrateSink::default()))
    }
}

impl RedactingLogger {
    /// Creates a logger writing to `sink`.
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            max_len: DEFAULT_MAX_LEN,
        }
    }

    /// A logger that drops every entry.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopSink))
    }

    /// Sets the per-payload truncation limit in characters.
    #[must_use]
    pub const fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    fn payload<T: Serialize + fmt::Debug + ?Sized>(&self, payload: &T) -> String {
        format_for_log(payload, self.max_len)
    }

    /// Logs an outgoing auth request. The signature is shortened, never logged whole.
    pub fn auth_request(&self, url: &str, key_id: &str, timestamp: &str, signature: &str) {
        let payload = AuthPayloadLog {
            key_id,
            timestamp,
            signature: abbreviate_signature(signature),
        };
        let rendered = serde_json::to_string(&payload).unwrap_or_default();
        self.sink
            .emit(&format!("[AUTH][REQUEST] POST {url}\npayload={rendered}"));
    }

    /// Logs an auth response. The body is redacted, so the `jwe` never appears.
    pub fn auth_response(&self, status: u16, headers: &BTreeMap<String, String>, body: &str) {
        self.sink.emit(&format!(
            "[AUTH][RESPONSE] {status}\nheaders={}\nbody={}",
            self.payload(headers),
            format_response_text(body, self.max_len)
        ));
    }

    /// Logs an auth failure.
    pub fn auth_error(&self, error: &dyn std::error::Error) {
        self.sink.emit(&format!("[AUTH][ERROR] {error}"));
    }

    /// Logs an outgoing API request.
    pub fn api_request(
        &self,
        method: &str,
        url: &str,
        headers: &BTreeMap<String, String>,
        query: &Map<String, Value>,
        body: Option<&Value>,
    ) {
        self.sink.emit(&format!(
            "[API][REQUEST] {method} {url}\nheaders={}\nparams={}\nbody={}",
            self.payload(headers),
            self.payload(query),
            self.payload(&body)
        ));
    }

    /// Logs the final response of an API call.
    pub fn api_response(&self, result: &CallResult) {
        self.sink.emit(&format!(
            "[API][RESPONSE] {}\nheaders={}\nbody={}",
            result.status_code,
            self.payload(&result.headers),
            format_response_text(&result.body_text, self.max_len)
        ));
    }

    /// Logs an API call that failed without a response.
    pub fn api_error(&self, method: &str, url: &str, error: &dyn std::error::Error) {
        self.sink
            .emit(&format!("[API][ERROR] {method} {url}: {error}"));
    }
}
