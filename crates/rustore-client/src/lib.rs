//! # rustore-client
//!
//! Authenticated client core for the RuStore public API.
//!
//! The crate is organised around a single call path:
//! - [`Signer`] signs `key_id + timestamp` with RSA SHA-512 (PKCS#1 v1.5)
//! - [`TokenManager`] exchanges the signature for a cached access token,
//!   refreshing it single-flight when it nears expiry
//! - [`ApiClient`] sends requests with the token, retrying transient failures
//!   with exponential backoff and re-authenticating once on `401`/`403`
//! - [`RedactingLogger`] records every exchange with secrets removed
//!
//! [`MethodService`] adds catalog awareness on top of [`ApiClient`].
//!
//! ## Example
//!
//! ```no_run
//! use rustore_client::{ApiClient, MethodService};
//! use rustore_common::{CallParams, MethodCatalog, Settings};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::from_env()?;
//! let catalog = MethodCatalog::from_yaml_file("methods.yaml".as_ref())?;
//! let service = MethodService::new(ApiClient::from_settings(&settings)?);
//!
//! let method = catalog.find("reviews.list")?;
//! let (result, url) = service
//!     .call_method(&method, &settings.environment, &CallParams::default())
//!     .await?;
//! println!("{url}: {}\n{}", result.status_code, result.pretty_body());
//! # Ok(())
//! # }
//! ```

/// Authenticated API calls.
pub mod api;
pub mod clock;
pub mod error;
pub mod logging;
pub mod redact;
pub mod retry;
pub mod service;
pub mod signer;
pub mod token;

pub use api::{ApiClient, TOKEN_HEADER, filter_query, query_pairs, resolve_path};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ClientError, Result};
pub use logging::{FnSink, LogCrateSink, LogSink, MemorySink, NoopSink, RedactingLogger};
pub use redact::{SENSITIVE_KEYS, format_for_log, format_response_text};
pub use retry::{HasStatus, RecordingSleeper, Sleeper, TokioSleeper, Transient, execute_with_retry};
pub use service::MethodService;
pub use signer::{Signer, format_timestamp, sign};
pub use token::{Token, TokenManager, TokenState};
