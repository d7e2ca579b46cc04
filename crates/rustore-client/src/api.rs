//! Authenticated API calls.
//!
//! [`ApiClient::call`] turns a method, path template and [`CallParams`] into
//! one logical request: the path is resolved, empty query values are dropped,
//! the cached token is attached as `Public-Token`, and the send runs under the
//! retry policy. A `401`/`403` triggers exactly one forced token refresh and
//! one more retried send.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use rustore_common::{CallParams, CallResult, RetryPolicy, Settings};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};

use crate::error::{ClientError, Result};
use crate::logging::RedactingLogger;
use crate::retry::{Sleeper, TokioSleeper, execute_with_retry};
use crate::token::{TokenManager, header_map};

/// Header carrying the access token.
pub const TOKEN_HEADER: &str = "Public-Token";

const JSON: &str = "application/json";

/// Client for the RuStore public API.
///
/// Cheap to clone; clones share the token cache and connection pool.
///
/// # Examples
///
/// ```no_run
/// use rustore_client::ApiClient;
/// use rustore_common::{CallParams, Settings};
/// use serde_json::{Map, json};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let settings = Settings::from_env()?;
/// let client = ApiClient::from_settings(&settings)?;
///
/// let mut path = Map::new();
/// path.insert("packageName".to_string(), json!("com.example.app"));
/// let params = CallParams::builder().path(path).build();
///
/// let (result, url) = client
///     .call("GET", "/public/v1/application/{packageName}", &params)
///     .await?;
/// println!("{url} -> {}", result.status_code);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    retry_policy: RetryPolicy,
    tokens: Arc<TokenManager>,
    sleeper: Arc<dyn Sleeper>,
    logger: RedactingLogger,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry_policy", &self.retry_policy)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Creates a client that shares an existing token manager.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConfigurationError`] if the HTTP client cannot be built.
    pub fn new(settings: &Settings, tokens: Arc<TokenManager>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.http_timeout())
            .build()
            .map_err(|e| ClientError::ConfigurationError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            timeout: settings.http_timeout(),
            retry_policy: settings.retry_policy(),
            tokens,
            sleeper: Arc::new(TokioSleeper),
            logger: RedactingLogger::default(),
        })
    }

    /// Creates a client and its token manager from settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid or the key does not parse.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;
        let tokens = Arc::new(TokenManager::new(settings)?);
        Self::new(settings, tokens)
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Replaces the backoff sleeper.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Replaces the request/response logger.
    #[must_use]
    pub fn with_logger(mut self, logger: RedactingLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Replaces the HTTP client.
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// The API base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The shared token manager.
    pub const fn token_manager(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// The active retry policy.
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Performs one logical API call.
    ///
    /// Returns the final response together with the resolved URL (without the
    /// query string). Non-2xx statuses are not errors; inspect
    /// [`CallResult::status_code`].
    ///
    /// # Errors
    ///
    /// - [`ClientError::InvalidRequest`] for an unusable HTTP method
    /// - [`ClientError::PathResolutionError`] if a placeholder has no value
    /// - authentication errors from the token manager
    /// - [`ClientError::NetworkError`] when every attempt failed in transport
    pub async fn call(
        &self,
        http_method: &str,
        path_template: &str,
        params: &CallParams,
    ) -> Result<(CallResult, String)> {
        let method = parse_method(http_method)?;
        // Path errors surface before any auth request.
        let path = resolve_path(path_template, &params.path)?;
        let url = format!("{}{path}", self.base_url);
        let query = filter_query(&params.query);
        let pairs = query_pairs(&query);
        let body = params.body.as_ref().filter(|body| !is_empty_body(body));

        let token = self.tokens.get_token(false).await?;
        self.logger.api_request(
            method.as_str(),
            &url,
            &log_headers(&token),
            &query,
            body,
        );

        let mut result = self.send(&method, &url, &token, &pairs, body).await;

        if matches!(&result, Ok(response) if response.is_auth_failure()) {
            info!("Token rejected by {url}; refreshing and retrying once");
            let token = self.tokens.get_token(true).await?;
            result = self.send(&method, &url, &token, &pairs, body).await;
        }

        match result {
            Ok(response) => {
                self.logger.api_response(&response);
                Ok((response, url))
            }
            Err(err) => {
                self.logger.api_error(method.as_str(), &url, &err);
                Err(err)
            }
        }
    }

    async fn send(
        &self,
        method: &Method,
        url: &str,
        token: &SecretString,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<CallResult> {
        execute_with_retry(&self.retry_policy, self.sleeper.as_ref(), |attempt| {
            debug!("{method} {url} attempt {attempt}");
            let mut request = self
                .http
                .request(method.clone(), url)
                .timeout(self.timeout)
                .header(TOKEN_HEADER, token.expose_secret())
                .header(ACCEPT, JSON)
                .header(CONTENT_TYPE, JSON)
                .query(query);
            if let Some(body) = body {
                request = request.json(body);
            }

            async move {
                let response = request.send().await?;
                let status_code = response.status().as_u16();
                let headers = header_map(response.headers());
                let body_text = response.text().await?;
                Ok::<_, ClientError>(CallResult {
                    status_code,
                    headers,
                    body_text,
                })
            }
        })
        .await
    }
}

fn parse_method(http_method: &str) -> Result<Method> {
    let normalized = http_method.trim().to_ascii_uppercase();
    if normalized.is_empty() {
        return Err(ClientError::InvalidRequest("HTTP method is empty".to_string()));
    }
    Method::from_bytes(normalized.as_bytes())
        .map_err(|_| ClientError::InvalidRequest(format!("invalid HTTP method '{http_method}'")))
}

fn log_headers(token: &SecretString) -> BTreeMap<String, String> {
    BTreeMap::from([
        (TOKEN_HEADER.to_string(), token.expose_secret().to_string()),
        ("Accept".to_string(), JSON.to_string()),
        ("Content-Type".to_string(), JSON.to_string()),
    ])
}

/// Substitutes `{name}` placeholders in a path template.
///
/// `{{` and `}}` produce literal braces. Strings are inserted as-is, other
/// JSON values in their compact JSON form. A placeholder whose value is
/// missing, `null` or an empty string is an error.
///
/// # Errors
///
/// Returns [`ClientError::PathResolutionError`] for a missing value or
/// unbalanced braces.
///
/// # Examples
///
/// ```
/// use rustore_client::resolve_path;
/// use serde_json::{Map, json};
///
/// let mut params = Map::new();
/// params.insert("packageName".to_string(), json!("com.example.app"));
/// params.insert("versionId".to_string(), json!(42));
///
/// let path = resolve_path("/v1/application/{packageName}/version/{versionId}", &params)?;
/// assert_eq!(path, "/v1/application/com.example.app/version/42");
/// # Ok::<(), rustore_client::ClientError>(())
/// ```
pub fn resolve_path(template: &str, params: &Map<String, Value>) -> Result<String> {
    let failure = |reason: String| ClientError::PathResolutionError {
        template: template.to_string(),
        reason,
    };

    let mut resolved = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                resolved.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                resolved.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => return Err(failure("unclosed '{'".to_string())),
                    }
                }
                let value = params
                    .get(&name)
                    .filter(|value| !is_blank(value))
                    .ok_or_else(|| failure(format!("missing path parameter '{name}'")))?;
                resolved.push_str(&scalar_text(value));
            }
            '}' => return Err(failure("unmatched '}'".to_string())),
            other => resolved.push(other),
        }
    }

    Ok(resolved)
}

/// Drops query values that should not be sent: `null`, `""` and `[]`.
pub fn filter_query(query: &Map<String, Value>) -> Map<String, Value> {
    query
        .iter()
        .filter(|(_, value)| !is_blank(value) && !matches!(value, Value::Array(items) if items.is_empty()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Flattens query values into string pairs. Arrays repeat the key once per item.
pub fn query_pairs(query: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(query.len());
    for (key, value) in query {
        match value {
            Value::Array(items) => {
                pairs.extend(items.iter().map(|item| (key.clone(), scalar_text(item))));
            }
            other => pairs.push((key.clone(), scalar_text(other))),
        }
    }
    pairs
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn is_empty_body(body: &Value) -> bool {
    match body {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
