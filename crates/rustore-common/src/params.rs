//! Parameter typing for catalog methods.
//!
//! The catalog declares every parameter with a small type language:
//! `str`, `int`, `float`, `bool`, `list[T]` and `dict`/`object`/`json`.
//! [`ParamType`] parses those names, converts raw text typed by a user into
//! JSON values, and produces placeholder body templates.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::catalog::ParamSpec;
use crate::error::{CommonError, Result};

/// Declared type of a catalog parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ParamType {
    /// Free text.
    #[default]
    Str,
    /// Signed integer.
    Int,
    /// Floating point number.
    Float,
    /// Boolean flag.
    Bool,
    /// Comma separated list of the inner type.
    List(Box<ParamType>),
    /// Arbitrary JSON object.
    Object,
    /// Any type name this client does not understand. Values pass through as text.
    Other(String),
}

impl ParamType {
    /// Parses a catalog type name. Never fails: unknown names become [`ParamType::Other`].
    pub fn parse(name: &str) -> Self {
        let name = name.trim();
        match name {
            "" | "str" => Self::Str,
            "int" => Self::Int,
            "float" => Self::Float,
            "bool" => Self::Bool,
            "dict" | "object" | "json" => Self::Object,
            _ => name
                .strip_prefix("list[")
                .and_then(|rest| rest.strip_suffix(']'))
                .map_or_else(
                    || Self::Other(name.to_string()),
                    |inner| Self::List(Box::new(Self::parse(inner))),
                ),
        }
    }

    /// Converts raw user input into a JSON value of this type.
    ///
    /// Blank input means "not provided" and yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`CommonError::InvalidParameter`] when the text is not a valid
    /// number or JSON object for the declared type.
    pub fn parse_value(&self, name: &str, raw: &str) -> Result<Option<Value>> {
        if raw.trim().is_empty() {
            return Ok(None);
        }

        let value = match self {
            Self::Int => Value::from(self.parse_int(name, raw)?),
            Self::Float => Value::Number(self.parse_float(name, raw)?),
            Self::Bool => Value::Bool(matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "y" | "on"
            )),
            Self::List(inner) => {
                let items = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(|item| match inner.as_ref() {
                        Self::Int => inner.parse_int(name, item).map(Value::from),
                        Self::Float => inner.parse_float(name, item).map(Value::Number),
                        _ => Ok(Value::String(item.to_string())),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Value::Array(items)
            }
            Self::Object => serde_json::from_str(raw).map_err(|e| self.invalid(name, e))?,
            Self::Str | Self::Other(_) => Value::String(raw.to_string()),
        };

        Ok(Some(value))
    }

    /// Placeholder value used in body templates.
    pub fn placeholder(&self) -> Value {
        match self {
            Self::Str => Value::String(String::new()),
            Self::List(_) => Value::Array(Vec::new()),
            Self::Object => Value::Object(Map::new()),
            Self::Int | Self::Float | Self::Bool | Self::Other(_) => Value::Null,
        }
    }

    fn parse_int(&self, name: &str, raw: &str) -> Result<i64> {
        raw.trim().parse().map_err(|e| self.invalid(name, e))
    }

    fn parse_float(&self, name: &str, raw: &str) -> Result<Number> {
        let parsed: f64 = raw.trim().parse().map_err(|e| self.invalid(name, e))?;
        Number::from_f64(parsed).ok_or_else(|| self.invalid(name, "not a finite number"))
    }

    fn invalid(&self, name: &str, reason: impl fmt::Display) -> CommonError {
        CommonError::InvalidParameter {
            name: name.to_string(),
            expected: self.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str => f.write_str("str"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::Bool => f.write_str("bool"),
            Self::List(inner) => write!(f, "list[{inner}]"),
            Self::Object => f.write_str("dict"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

impl From<String> for ParamType {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<ParamType> for String {
    fn from(param_type: ParamType) -> Self {
        param_type.to_string()
    }
}

/// Builds a JSON body skeleton from a body parameter schema.
///
/// Strings become `""`, lists `[]`, objects `{}`, and everything else `null`,
/// so the result is valid JSON that a user can fill in.
pub fn body_template(schema: &BTreeMap<String, ParamSpec>) -> Value {
    Value::Object(
        schema
            .iter()
            .map(|(name, spec)| (name.clone(), spec.param_type.placeholder()))
            .collect(),
    )
}
