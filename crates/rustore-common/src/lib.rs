//! # rustore-common
//!
//! Shared types for the RuStore public API client.
//!
//! This crate holds everything that does not perform I/O against the API:
//! - Client [`Settings`] loaded from the environment or a TOML file
//! - The declarative method catalog and its parameter type language
//! - [`CallParams`], [`CallResult`] and the [`RetryPolicy`] value
//!
//! ## Example
//!
//! ```
//! use rustore_common::{MethodCatalog, body_template};
//!
//! let catalog = MethodCatalog::from_yaml_str(r#"
//! groups:
//!   apps:
//!     methods:
//!       create_draft:
//!         http_method: POST
//!         paths: { prod: "/public/v1/application/{packageName}/version" }
//!         params:
//!           body:
//!             appName: { type: str, required: true }
//! "#)?;
//!
//! let method = catalog.find("apps.create_draft")?;
//! assert_eq!(method.http_method, "POST");
//! assert_eq!(body_template(&method.params.body)["appName"], "");
//! # Ok::<(), rustore_common::CommonError>(())
//! ```

/// Method catalog: groups, methods and parameter declarations.
pub mod catalog;
/// Call parameters, call results and retry configuration.
pub mod client;
/// Client settings.
pub mod config;
pub mod error;
pub mod params;

pub use catalog::{MethodCatalog, MethodDescriptor, MethodGroup, MethodSpec, ParamSpec, ParameterSchema};
pub use client::{CallParams, CallResult, DEFAULT_RETRYABLE_STATUSES, RetryPolicy};
pub use config::{AUTH_PATH, DEFAULT_BASE_URL, Settings};
pub use error::CommonError;
pub use params::{ParamType, body_template};
