//! Method catalog types.
//!
//! The catalog is a declarative YAML description of the API surface, grouped
//! by area:
//!
//! ```yaml
//! groups:
//!   apps:
//!     title: Applications
//!     methods:
//!       get_app:
//!         title: Get application
//!         http_method: GET
//!         paths:
//!           prod: /public/v1/application/{packageName}
//!           sandbox: /public/sandbox/v1/application/{packageName}
//!         params:
//!           path:
//!             packageName: { type: str, required: true, hint: "com.example.app" }
//!           query:
//!             lang: { type: str }
//!           body: {}
//! ```
//!
//! The client only ever sees flattened [`MethodDescriptor`]s.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{CommonError, Result};
use crate::params::ParamType;

/// Declaration of a single parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Declared type. Defaults to `str`.
    #[serde(rename = "type", default)]
    pub param_type: ParamType,
    /// Whether the caller must supply a value.
    #[serde(default)]
    pub required: bool,
    /// Human readable hint, typically an example value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Parameters of a method, split by where they are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Path template placeholders.
    #[serde(default, deserialize_with = "param_section")]
    pub path: BTreeMap<String, ParamSpec>,
    /// Query string parameters.
    #[serde(default, deserialize_with = "param_section")]
    pub query: BTreeMap<String, ParamSpec>,
    /// JSON body fields.
    #[serde(default, deserialize_with = "param_section")]
    pub body: BTreeMap<String, ParamSpec>,
}

/// A method as written in the catalog file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSpec {
    /// Display title. Falls back to the method key.
    #[serde(default)]
    pub title: Option<String>,
    /// HTTP verb. Defaults to `GET`.
    #[serde(default = "default_http_method")]
    pub http_method: String,
    /// Path templates keyed by environment (`prod`, `sandbox`).
    #[serde(default, deserialize_with = "null_as_default")]
    pub paths: BTreeMap<String, String>,
    /// Parameter declarations.
    #[serde(default, deserialize_with = "null_as_default")]
    pub params: ParameterSchema,
}

/// A titled group of methods.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodGroup {
    /// Display title. Falls back to the group key.
    #[serde(default)]
    pub title: Option<String>,
    /// Methods keyed by method key.
    #[serde(default, deserialize_with = "null_as_default")]
    pub methods: BTreeMap<String, MethodSpec>,
}

/// The whole catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodCatalog {
    /// Groups keyed by group key.
    #[serde(default, deserialize_with = "null_as_default")]
    pub groups: BTreeMap<String, MethodGroup>,
}

/// Flattened, read-only view of one catalog method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Key of the owning group.
    pub group_key: String,
    /// Title of the owning group.
    pub group_title: String,
    /// Method key, unique within the group.
    pub key: String,
    /// Display title.
    pub title: String,
    /// Upper-cased HTTP verb.
    pub http_method: String,
    /// Path templates keyed by environment.
    pub paths: BTreeMap<String, String>,
    /// Parameter declarations.
    pub params: ParameterSchema,
}

impl MethodDescriptor {
    /// The `group.method` identifier used on the command line.
    pub fn id(&self) -> String {
        format!("{}.{}", self.group_key, self.key)
    }

    /// Path template for an environment, if the method is available there.
    pub fn path_for(&self, environment: &str) -> Option<&str> {
        self.paths
            .get(environment)
            .map(String::as_str)
            .filter(|path| !path.is_empty())
    }
}

fn default_http_method() -> String {
    "GET".to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn param_section<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, ParamSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    let section: Option<BTreeMap<String, Option<ParamSpec>>> = Option::deserialize(deserializer)?;
    Ok(section
        .unwrap_or_default()
        .into_iter()
        .map(|(name, spec)| (name, spec.unwrap_or_default()))
        .collect())
}

impl MethodCatalog {
    /// Parses a catalog from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Loads a catalog from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// All methods, ordered by group key then method key.
    pub fn list_methods(&self) -> Vec<MethodDescriptor> {
        self.groups
            .iter()
            .flat_map(|(group_key, group)| {
                let group_title = group.title.clone().unwrap_or_else(|| group_key.clone());
                group.methods.iter().map(move |(key, spec)| MethodDescriptor {
                    group_key: group_key.clone(),
                    group_title: group_title.clone(),
                    key: key.clone(),
                    title: spec.title.clone().unwrap_or_else(|| key.clone()),
                    http_method: spec.http_method.trim().to_ascii_uppercase(),
                    paths: spec.paths.clone(),
                    params: spec.params.clone(),
                })
            })
            .collect()
    }

    /// Looks up a method by its `group.method` identifier.
    ///
    /// # Errors
    ///
    /// Returns [`CommonError::MethodNotFound`] if no such method exists.
    pub fn find(&self, id: &str) -> Result<MethodDescriptor> {
        self.list_methods()
            .into_iter()
            .find(|method| method.id() == id)
            .ok_or_else(|| CommonError::MethodNotFound(id.to_string()))
    }
}
