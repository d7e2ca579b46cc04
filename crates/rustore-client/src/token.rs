//! Access token acquisition and caching.
//!
//! [`TokenManager`] exchanges a signed `{keyId, timestamp, signature}` payload
//! for a `jwe` token and caches it until `expires_at - skew`. Refreshes are
//! single-flight: concurrent callers that find the token stale wait for one
//! refresh and share its result.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, info};
use reqwest::header::HeaderMap;
use rustore_common::Settings;
use secrecy::SecretString;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use crate::clock::{Clock, SystemClock};
use crate::error::{ClientError, Result};
use crate::logging::RedactingLogger;
use crate::redact::{DEFAULT_MAX_LEN, format_response_text};
use crate::signer::{Signer, format_timestamp};

/// A bearer token and the instant it stops being accepted.
#[derive(Clone)]
pub struct Token {
    value: SecretString,
    expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Token {
    /// Creates a token.
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: SecretString::from(value.into()),
            expires_at,
        }
    }

    /// The secret token value.
    pub const fn value(&self) -> &SecretString {
        &self.value
    }

    /// Server-side expiry.
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the token is still usable at `now`, given `skew` of headroom.
    pub fn is_valid_at(&self, now: DateTime<Utc>, skew: TimeDelta) -> bool {
        self.expires_at
            .checked_sub_signed(skew)
            .is_some_and(|limit| now < limit)
    }
}

/// Observable state of the token cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// No token has been obtained yet.
    NoToken,
    /// A token is cached and usable.
    Valid,
    /// A token is cached but inside the skew window or past expiry.
    Expired,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthRequest<'a> {
    key_id: &'a str,
    timestamp: &'a str,
    signature: &'a str,
}

/// Obtains and caches the API access token.
pub struct TokenManager {
    http: reqwest::Client,
    signer: Signer,
    auth_url: String,
    timeout: Duration,
    skew: TimeDelta,
    clock: Arc<dyn Clock>,
    logger: RedactingLogger,
    current: RwLock<Option<Token>>,
    refresh_gate: Mutex<()>,
    generation: AtomicU64,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("auth_url", &self.auth_url)
            .field("signer", &self.signer)
            .field("skew", &self.skew)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Creates a manager from settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the private key is missing or invalid, or if the
    /// HTTP client cannot be built.
    pub fn new(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.http_timeout())
            .build()
            .map_err(|e| ClientError::ConfigurationError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            signer: Signer::from_settings(settings)?,
            auth_url: settings.auth_url(),
            timeout: settings.http_timeout(),
            skew: TimeDelta::from_std(settings.token_skew()).unwrap_or(TimeDelta::MAX),
            clock: Arc::new(SystemClock),
            logger: RedactingLogger::default(),
            current: RwLock::new(None),
            refresh_gate: Mutex::new(()),
            generation: AtomicU64::new(0),
        })
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the request/response logger.
    #[must_use]
    pub fn with_logger(mut self, logger: RedactingLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Replaces the HTTP client, e.g. to share a connection pool.
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Returns a usable token, authenticating if needed.
    ///
    /// With `force_refresh` the cached token is ignored, which is how a caller
    /// reacts to the server rejecting it. If another caller completes a refresh
    /// while this one waits, that fresh token is returned without a second
    /// auth request.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AuthenticationError`] or
    /// [`ClientError::UnexpectedAuthResponseError`] if authentication fails,
    /// and signing errors if the key cannot sign. The cache is left unchanged
    /// on failure.
    pub async fn get_token(&self, force_refresh: bool) -> Result<SecretString> {
        let seen_generation = self.generation.load(Ordering::Acquire);

        if !force_refresh && let Some(token) = self.cached_valid().await {
            return Ok(token);
        }

        let _gate = self.refresh_gate.lock().await;

        if self.generation.load(Ordering::Acquire) != seen_generation
            && let Some(token) = self.cached_valid().await
        {
            debug!("Reusing token refreshed by a concurrent caller");
            return Ok(token);
        }

        let token = self.authenticate().await?;
        let value = token.value.clone();
        info!("Obtained access token valid until {}", token.expires_at);

        *self.current.write().await = Some(token);
        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(value)
    }

    /// Current cache state.
    pub async fn state(&self) -> TokenState {
        match self.current.read().await.as_ref() {
            None => TokenState::NoToken,
            Some(token) if token.is_valid_at(self.clock.now(), self.skew) => TokenState::Valid,
            Some(_) => TokenState::Expired,
        }
    }

    /// Expiry of the cached token, if any.
    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.current.read().await.as_ref().map(Token::expires_at)
    }

    /// Drops the cached token so the next call authenticates.
    pub async fn clear(&self) {
        *self.current.write().await = None;
    }

    async fn cached_valid(&self) -> Option<SecretString> {
        let now = self.clock.now();
        self.current
            .read()
            .await
            .as_ref()
            .filter(|token| token.is_valid_at(now, self.skew))
            .map(|token| token.value.clone())
    }

    async fn authenticate(&self) -> Result<Token> {
        let timestamp = format_timestamp(self.clock.now());
        let signature = self.signer.sign(&timestamp)?;
        self.logger
            .auth_request(&self.auth_url, self.signer.key_id(), &timestamp, &signature);

        let payload = AuthRequest {
            key_id: self.signer.key_id(),
            timestamp: &timestamp,
            signature: &signature,
        };

        let result = self.exchange(&payload).await;
        if let Err(err) = &result {
            self.logger.auth_error(err);
        }
        result
    }

    async fn exchange(&self, payload: &AuthRequest<'_>) -> Result<Token> {
        let response = self
            .http
            .post(&self.auth_url)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let headers = header_map(response.headers());
        let body = response.text().await.map_err(transport_error)?;
        self.logger.auth_response(status, &headers, &body);

        if !(200..300).contains(&status) {
            return Err(ClientError::AuthenticationError {
                status: Some(status),
                message: format_response_text(&body, DEFAULT_MAX_LEN),
                source: None,
            });
        }

        parse_auth_body(&body, self.clock.now())
    }
}

fn transport_error(err: reqwest::Error) -> ClientError {
    ClientError::AuthenticationError {
        status: None,
        message: err.to_string(),
        source: Some(err),
    }
}

/// Flattens response headers, joining repeated values with `", "`.
pub(crate) fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        map.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    map
}

/// Extracts `body.jwe` and `body.ttl` from an auth response.
///
/// `ttl` is seconds and may be an integer, a float or a numeric string; it
/// must be positive.
fn parse_auth_body(body: &str, now: DateTime<Utc>) -> Result<Token> {
    let unexpected = || ClientError::UnexpectedAuthResponseError {
        raw: format_response_text(body, DEFAULT_MAX_LEN),
    };

    let data: Value = serde_json::from_str(body).map_err(|_| unexpected())?;
    let inner = data.get("body").filter(|inner| inner.is_object());

    let jwe = inner
        .and_then(|inner| inner.get("jwe"))
        .and_then(Value::as_str)
        .filter(|jwe| !jwe.is_empty())
        .ok_or_else(unexpected)?;

    let ttl = inner
        .and_then(|inner| inner.get("ttl"))
        .and_then(ttl_seconds)
        .ok_or_else(unexpected)?;

    let expires_at = now.checked_add_signed(ttl).ok_or_else(unexpected)?;
    Ok(Token::new(jwe, expires_at))
}

fn ttl_seconds(raw: &Value) -> Option<TimeDelta> {
    let seconds = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let millis = (seconds * 1000.0).round() as i64;
    TimeDelta::try_milliseconds(millis)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use chrono::TimeZone;
    use secrecy::ExposeSecret;
    use serde_json::json;

    use super::*;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
    }

    #[test]
    fn test_token_validity_respects_skew() {
        let token = Token::new("t", start() + TimeDelta::seconds(100));
        let skew = TimeDelta::seconds(30);

        assert!(token.is_valid_at(start(), skew));
        assert!(token.is_valid_at(start() + TimeDelta::seconds(69), skew));
        assert!(!token.is_valid_at(start() + TimeDelta::seconds(70), skew));
        assert!(!token.is_valid_at(start() + TimeDelta::seconds(200), skew));
    }

    #[test]
    fn test_token_debug_hides_value() {
        let token = Token::new("SECRET-JWE", start());
        let debug = format!("{token:?}");
        assert!(!debug.contains("SECRET-JWE"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_parse_auth_body() {
        let token = parse_auth_body(r#"{"body":{"jwe":"abc","ttl":900}}"#, start()).unwrap();
        assert_eq!(token.value().expose_secret(), "abc");
        assert_eq!(token.expires_at(), start() + TimeDelta::seconds(900));

        let token = parse_auth_body(r#"{"body":{"jwe":"abc","ttl":"1.5"}}"#, start()).unwrap();
        assert_eq!(token.expires_at(), start() + TimeDelta::milliseconds(1500));
    }

    #[test]
    fn test_parse_auth_body_rejects_bad_shapes() {
        for body in [
            "not json",
            r#"{"code":"OK"}"#,
            r#"{"body":"jwe"}"#,
            r#"{"body":{"ttl":900}}"#,
            r#"{"body":{"jwe":"","ttl":900}}"#,
            r#"{"body":{"jwe":"abc"}}"#,
            r#"{"body":{"jwe":"abc","ttl":0}}"#,
            r#"{"body":{"jwe":"abc","ttl":-5}}"#,
            r#"{"body":{"jwe":"abc","ttl":"soon"}}"#,
            r#"{"body":{"jwe":"abc","ttl":null}}"#,
        ] {
            assert!(
                matches!(
                    parse_auth_body(body, start()),
                    Err(ClientError::UnexpectedAuthResponseError { .. })
                ),
                "accepted {body}"
            );
        }
    }

    #[test]
    fn test_unexpected_response_is_redacted() {
        let err = parse_auth_body(r#"{"body":{"jwe":"LEAK","ttl":"x"}}"#, start()).unwrap_err();
        assert!(!err.to_string().contains("LEAK"));
    }

    #[test]
    fn test_header_map_joins_repeated_values() {
        let mut headers = HeaderMap::new();
        headers.append("x-trace", "a".parse().unwrap());
        headers.append("x-trace", "b".parse().unwrap());
        headers.insert("content-type", "application/json".parse().unwrap());

        let map = header_map(&headers);
        assert_eq!(map["x-trace"], "a, b");
        assert_eq!(map["content-type"], "application/json");
    }

    #[test]
    fn test_auth_request_serializes_camel_case() {
        let payload = AuthRequest {
            key_id: "k",
            timestamp: "t",
            signature: "s",
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"keyId": "k", "timestamp": "t", "signature": "s"})
        );
    }
}
