//! Error types shared by the configuration and catalog layers.

use thiserror::Error;

/// Errors raised while loading configuration, reading the method catalog,
/// or converting user supplied parameter values.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CommonError {
    /// I/O error while reading a configuration or catalog file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// YAML deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Missing or invalid configuration value.
    ///
    /// Fatal at startup: the client cannot authenticate without a key id and
    /// a private key, and refuses plain-http base URLs unless explicitly allowed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A raw parameter value could not be converted to its declared type.
    #[error("Invalid value for parameter '{name}' ({expected}): {reason}")]
    InvalidParameter {
        /// Parameter name, or the raw value when the name is unknown.
        name: String,
        /// Declared catalog type.
        expected: String,
        /// What went wrong.
        reason: String,
    },

    /// No method with the given `group.method` key exists in the catalog.
    #[error("Method not found: {0}")]
    MethodNotFound(String),
}

/// Result type alias using `CommonError`.
pub type Result<T> = std::result::Result<T, CommonError>;
