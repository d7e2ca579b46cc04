//! Command implementations for the CLI.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context as _, Result, ensure};
use clap::Args;
use log::debug;
use serde_json::{Map, Value};

use rustore_client::{ApiClient, MethodService, TokenManager};
use rustore_common::{
    CallParams, MethodCatalog, MethodDescriptor, ParamSpec, Settings, body_template,
};

use crate::display;

/// Shared inputs for every command.
#[derive(Debug)]
pub struct Context {
    pub config_path: Option<PathBuf>,
    pub catalog_path: PathBuf,
}

impl Context {
    fn settings(&self) -> Result<Settings> {
        Settings::load(self.config_path.as_deref()).context("Failed to load settings")
    }

    fn catalog(&self) -> Result<MethodCatalog> {
        MethodCatalog::from_yaml_file(&self.catalog_path).with_context(|| {
            format!("Failed to load method catalog {}", self.catalog_path.display())
        })
    }
}

/// Arguments for the call command.
#[derive(Args, Debug, Default)]
pub struct CallArgs {
    /// Method id, as `group.method`
    pub method: String,

    /// Environment whose path template is used (defaults to the configured one)
    #[arg(long)]
    pub env: Option<String>,

    /// Path parameter
    #[arg(short = 'p', long = "path", value_name = "NAME=VALUE")]
    pub path: Vec<String>,

    /// Query parameter
    #[arg(short = 'q', long = "query", value_name = "NAME=VALUE")]
    pub query: Vec<String>,

    /// JSON request body
    #[arg(long, conflicts_with = "body_file")]
    pub body: Option<String>,

    /// File holding the JSON request body
    #[arg(long)]
    pub body_file: Option<PathBuf>,
}

/// Lists catalog methods, optionally for one group.
pub fn list_methods(ctx: &Context, group: Option<&str>) -> Result<()> {
    let catalog = ctx.catalog()?;
    let methods: Vec<MethodDescriptor> = catalog
        .list_methods()
        .into_iter()
        .filter(|method| group.is_none_or(|group| method.group_key == group))
        .collect();

    display::method_list(&methods);
    Ok(())
}

/// Prints a method's parameters and a JSON body skeleton.
pub fn show_template(ctx: &Context, method_id: &str) -> Result<()> {
    let catalog = ctx.catalog()?;
    let method = catalog.find(method_id)?;

    display::method_details(&method);
    println!(
        "{}",
        serde_json::to_string_pretty(&body_template(&method.params.body))?
    );
    Ok(())
}

/// Calls a catalog method and prints the response.
pub async fn call_method(ctx: &Context, args: CallArgs) -> Result<()> {
    let settings = ctx.settings()?;
    let catalog = ctx.catalog()?;
    let method = catalog.find(&args.method)?;
    let params = build_params(&method, &args)?;
    let environment = args.env.unwrap_or_else(|| settings.environment.clone());

    debug!("Calling {} in environment '{environment}'", method.id());
    let service = MethodService::new(ApiClient::from_settings(&settings)?);
    let (result, url) = service.call_method(&method, &environment, &params).await?;

    display::call_result(&method, &url, &result);
    ensure!(
        result.is_success(),
        "{} returned HTTP {}",
        method.id(),
        result.status_code
    );
    Ok(())
}

/// Authenticates and prints the token state.
pub async fn show_token(ctx: &Context, force: bool) -> Result<()> {
    let settings = ctx.settings()?;
    let tokens = TokenManager::new(&settings)?;

    tokens.get_token(force).await?;
    display::token_state(tokens.state().await, tokens.expires_at().await);
    Ok(())
}

/// Converts command line arguments into typed call parameters.
pub fn build_params(method: &MethodDescriptor, args: &CallArgs) -> Result<CallParams> {
    let body = match (&args.body, &args.body_file) {
        (Some(text), _) => Some(parse_body(text)?),
        (None, Some(file)) => {
            let text = fs::read_to_string(file)
                .with_context(|| format!("Failed to read body file {}", file.display()))?;
            Some(parse_body(&text)?)
        }
        (None, None) => None,
    };

    Ok(CallParams {
        path: parse_assignments(&args.path, &method.params.path)?,
        query: parse_assignments(&args.query, &method.params.query)?,
        body,
    })
}

/// Parses `NAME=VALUE` items, typing each value by the method's schema.
///
/// Names missing from the schema are sent as strings. Blank values are dropped.
fn parse_assignments(
    items: &[String],
    schema: &BTreeMap<String, ParamSpec>,
) -> Result<Map<String, Value>> {
    let mut values = Map::new();
    for item in items {
        let (name, raw) = item
            .split_once('=')
            .with_context(|| format!("Expected NAME=VALUE, got '{item}'"))?;
        let name = name.trim();
        ensure!(!name.is_empty(), "Parameter name is empty in '{item}'");

        let param_type = schema
            .get(name)
            .map(|spec| spec.param_type.clone())
            .unwrap_or_default();
        if let Some(value) = param_type.parse_value(name, raw)? {
            values.insert(name.to_string(), value);
        }
    }
    Ok(values)
}

fn parse_body(text: &str) -> Result<Value> {
    serde_json::from_str(text).context("Request body is not valid JSON")
}
