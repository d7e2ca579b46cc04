//! Error types for the client library.

use rustore_common::CommonError;
use thiserror::Error;

/// Errors that can occur when authenticating against or calling the RuStore API.
///
/// Every variant renders without secrets: raw response text is redacted
/// before it is stored, and signatures or tokens are never embedded.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// The private key could not be decoded or parsed.
    ///
    /// The key must be base64-encoded DER, either PKCS#8 or PKCS#1.
    #[error("Invalid private key: {0}")]
    InvalidKeyError(String),

    /// The RSA primitive failed to produce a signature.
    #[error("Signing failed: {0}")]
    SigningError(String),

    /// The auth endpoint could not be reached or rejected the credentials.
    #[error("Authentication failed{}: {message}", status_suffix(.status))]
    AuthenticationError {
        /// HTTP status of the auth response, if one was received.
        status: Option<u16>,
        /// Redacted description of the failure.
        message: String,
        /// Transport error, when the request never completed.
        #[source]
        source: Option<reqwest::Error>,
    },

    /// The auth endpoint answered 2xx but without a usable `jwe`/`ttl` pair.
    #[error("Unexpected auth response: {raw}")]
    UnexpectedAuthResponseError {
        /// Redacted response text.
        raw: String,
    },

    /// A path template could not be filled from the supplied path parameters.
    #[error("Cannot resolve path '{template}': {reason}")]
    PathResolutionError {
        /// The path template.
        template: String,
        /// What went wrong, such as a missing placeholder.
        reason: String,
    },

    /// Network or HTTP request failure during an API call.
    ///
    /// Indicates issues like DNS resolution, connection failures or timeouts.
    /// These errors are retryable.
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON serialization or deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Client configuration issue.
    ///
    /// Invalid base URL, missing key material or incompatible settings.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Malformed request, such as an unknown HTTP method.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The method has no path template for the selected environment.
    #[error("Method '{method}' is not available in environment '{environment}'")]
    UnknownEnvironmentError {
        /// `group.method` identifier.
        method: String,
        /// Requested environment.
        environment: String,
    },

    /// A parameter the catalog marks as required was not supplied.
    #[error("Missing required {location} parameter '{name}'")]
    MissingParameterError {
        /// `path`, `query` or `body`.
        location: &'static str,
        /// Parameter name.
        name: String,
    },

    /// Configuration or catalog error from the shared layer.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl ClientError {
    /// Check if this error is potentially retryable.
    ///
    /// Only transport failures during an API call are retried; HTTP statuses
    /// are classified by the retry policy instead.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError(_))
    }

    /// Check if this is an authentication error.
    pub const fn is_authentication_error(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationError { .. } | Self::UnexpectedAuthResponseError { .. }
        )
    }

    /// Check if this error was caused by caller input rather than the network
    /// or the server.
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::PathResolutionError { .. }
                | Self::InvalidRequest(_)
                | Self::UnknownEnvironmentError { .. }
                | Self::MissingParameterError { .. }
        )
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// Result type alias using `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;
