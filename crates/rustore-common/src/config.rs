//! Client settings.
//!
//! Settings come either from the process environment or from a TOML file at
//! `~/.config/rustore/config.toml`.
//!
//! ## Environment
//!
//! | variable | default |
//! |---|---|
//! | `RUSTORE_BASE_URL` | `https://public-api.rustore.ru` |
//! | `RUSTORE_KEY_ID` | required |
//! | `RUSTORE_PRIVATE_KEY_B64` | required |
//! | `RUSTORE_TOKEN_SKEW_SECONDS` | `30` |
//! | `HTTP_TIMEOUT_SECONDS` | `30` |
//! | `RUSTORE_ALLOW_INSECURE` | `false` |
//! | `RUSTORE_ENVIRONMENT` | `prod` |
//!
//! ## Example Configuration
//!
//! ```toml
//! base_url = "https://public-api.rustore.ru"
//! key_id = "1234567"
//! private_key_b64 = "MIIEvQIBADANBgkqhkiG9w0BAQEFAASC..."
//! token_skew_seconds = 30
//! http_timeout_seconds = 30
//! environment = "sandbox"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::client::RetryPolicy;
use crate::error::{CommonError, Result};

/// Production API host.
pub const DEFAULT_BASE_URL: &str = "https://public-api.rustore.ru";

/// Path of the authentication endpoint, relative to the base URL.
pub const AUTH_PATH: &str = "/public/auth/";

/// Connection settings for the RuStore public API.
///
/// The private key is held as a [`SecretString`] and is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// API base URL without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Identifier of the uploaded public key.
    #[serde(default)]
    pub key_id: String,
    /// Base64 of the DER-encoded RSA private key.
    #[serde(skip_serializing, default)]
    pub private_key_b64: Option<SecretString>,
    /// Seconds subtracted from the token expiry when checking validity.
    #[serde(default = "default_token_skew")]
    pub token_skew_seconds: u64,
    /// Timeout applied to every outbound HTTP request.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_seconds: u64,
    /// Allow a non-https base URL (local mocks only).
    #[serde(default)]
    pub allow_insecure: bool,
    /// Catalog environment used to pick path templates (`prod`, `sandbox`).
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

const fn default_token_skew() -> u64 {
    30
}

const fn default_http_timeout() -> u64 {
    30
}

fn default_environment() -> String {
    "prod".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            key_id: String::new(),
            private_key_b64: None,
            token_skew_seconds: default_token_skew(),
            http_timeout_seconds: default_http_timeout(),
            allow_insecure: false,
            environment: default_environment(),
        }
    }
}

impl Settings {
    /// Creates settings for the given key pair with every other field defaulted.
    pub fn new(key_id: impl Into<String>, private_key_b64: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            private_key_b64: Some(SecretString::from(private_key_b64.into())),
            ..Default::default()
        }
    }

    /// Sets the API base URL. A trailing slash is removed.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the token expiry skew.
    #[must_use]
    pub const fn with_token_skew(mut self, seconds: u64) -> Self {
        self.token_skew_seconds = seconds;
        self
    }

    /// Sets the per-request HTTP timeout.
    #[must_use]
    pub const fn with_http_timeout(mut self, seconds: u64) -> Self {
        self.http_timeout_seconds = seconds;
        self
    }

    /// Permits a plain-http base URL.
    #[must_use]
    pub const fn with_allow_insecure(mut self, allow: bool) -> Self {
        self.allow_insecure = allow;
        self
    }

    /// Sets the catalog environment.
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Loads settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric or boolean variable cannot be parsed, or
    /// if the resulting settings fail [`Settings::validate`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads settings through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Settings::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(base_url) = lookup("RUSTORE_BASE_URL").filter(|v| !v.is_empty()) {
            settings = settings.with_base_url(base_url);
        }
        if let Some(key_id) = lookup("RUSTORE_KEY_ID") {
            settings.key_id = key_id.trim().to_string();
        }
        if let Some(key) = lookup("RUSTORE_PRIVATE_KEY_B64").filter(|v| !v.trim().is_empty()) {
            settings.private_key_b64 = Some(SecretString::from(key.trim().to_string()));
        }
        if let Some(raw) = lookup("RUSTORE_TOKEN_SKEW_SECONDS") {
            settings.token_skew_seconds = parse_number("RUSTORE_TOKEN_SKEW_SECONDS", &raw)?;
        }
        if let Some(raw) = lookup("HTTP_TIMEOUT_SECONDS") {
            settings.http_timeout_seconds = parse_number("HTTP_TIMEOUT_SECONDS", &raw)?;
        }
        if let Some(raw) = lookup("RUSTORE_ALLOW_INSECURE") {
            settings.allow_insecure = parse_flag("RUSTORE_ALLOW_INSECURE", &raw)?;
        }
        if let Some(environment) = lookup("RUSTORE_ENVIRONMENT").filter(|v| !v.is_empty()) {
            settings.environment = environment;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// settings fail validation.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            CommonError::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parses settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let settings: Self = toml::from_str(contents)?;
        let base_url = settings.base_url.clone();
        let settings = settings.with_base_url(base_url);
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from `path`, the default config file, or the
    /// environment, in that order of preference.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen source is unreadable or invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_toml_file(path);
        }

        match Self::config_path() {
            Ok(default_path) if default_path.exists() => {
                debug!("Loading settings from {}", default_path.display());
                Self::from_toml_file(&default_path)
            }
            _ => {
                debug!("Loading settings from environment");
                Self::from_env()
            }
        }
    }

    /// Returns the default configuration file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined.
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CommonError::Config("Failed to determine config directory".to_string()))?
            .join("rustore");

        Ok(config_dir.join("config.toml"))
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the key id or private key is missing
    /// - the base URL cannot be parsed
    /// - the base URL is not https and `allow_insecure` is not set
    pub fn validate(&self) -> Result<()> {
        if self.key_id.trim().is_empty() {
            return Err(CommonError::Config("RUSTORE_KEY_ID is not set".to_string()));
        }

        let has_key = self
            .private_key_b64
            .as_ref()
            .is_some_and(|key| !key.expose_secret().trim().is_empty());
        if !has_key {
            return Err(CommonError::Config(
                "RUSTORE_PRIVATE_KEY_B64 is not set".to_string(),
            ));
        }

        let url = url::Url::parse(&self.base_url).map_err(|e| {
            CommonError::Config(format!("Invalid base URL '{}': {e}", self.base_url))
        })?;

        if url.scheme() != "https" && !self.allow_insecure {
            return Err(CommonError::Config(format!(
                "Base URL must use https (got '{}'); set allow_insecure to override",
                url.scheme()
            )));
        }

        Ok(())
    }

    /// Full URL of the authentication endpoint.
    pub fn auth_url(&self) -> String {
        format!("{}{AUTH_PATH}", self.base_url)
    }

    /// Token expiry skew as a [`Duration`].
    pub const fn token_skew(&self) -> Duration {
        Duration::from_secs(self.token_skew_seconds)
    }

    /// HTTP timeout as a [`Duration`].
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    /// Retry policy for business requests.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }
}

fn parse_number(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|e| CommonError::Config(format!("{name} must be a non-negative integer: {e}")))
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(CommonError::Config(format!(
            "{name} must be a boolean, got '{other}'"
        ))),
    }
}
