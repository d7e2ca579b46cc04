//! Catalog-driven calls.
//!
//! [`MethodService`] picks the path template for an environment, checks
//! required parameters against the method's schema, and delegates to
//! [`ApiClient::call`].

use rustore_common::{CallParams, CallResult, MethodDescriptor};
use serde_json::Value;

use crate::api::ApiClient;
use crate::error::{ClientError, Result};

/// Executes catalog methods.
#[derive(Debug, Clone)]
pub struct MethodService {
    client: ApiClient,
}

impl MethodService {
    /// Wraps an API client.
    pub const fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// The underlying client.
    pub const fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Calls `method` in `environment`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnknownEnvironmentError`] if the method has no
    /// path for `environment`, [`ClientError::MissingParameterError`] if a
    /// required query or body parameter is absent, and anything
    /// [`ApiClient::call`] returns.
    pub async fn call_method(
        &self,
        method: &MethodDescriptor,
        environment: &str,
        params: &CallParams,
    ) -> Result<(CallResult, String)> {
        let template = method
            .path_for(environment)
            .ok_or_else(|| ClientError::UnknownEnvironmentError {
                method: method.id(),
                environment: environment.to_string(),
            })?;

        check_required(method, params)?;

        self.client
            .call(&method.http_method, template, params)
            .await
    }
}

/// Verifies every required query and body parameter has a value.
///
/// Path parameters are checked during path resolution.
///
/// # Errors
///
/// Returns [`ClientError::MissingParameterError`] for the first absent one.
pub fn check_required(method: &MethodDescriptor, params: &CallParams) -> Result<()> {
    let missing = |location: &'static str, name: &str| ClientError::MissingParameterError {
        location,
        name: name.to_string(),
    };

    for (name, spec) in &method.params.query {
        if spec.required && !has_value(params.query.get(name)) {
            return Err(missing("query", name));
        }
    }

    let body_fields = params.body.as_ref().and_then(Value::as_object);
    for (name, spec) in &method.params.body {
        if spec.required && !has_value(body_fields.and_then(|fields| fields.get(name))) {
            return Err(missing("body", name));
        }
    }

    Ok(())
}

fn has_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}
