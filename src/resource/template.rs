//! Instance Templates
//!
//! A template is the skeleton document of a new resource instance. Tokens of
//! the form `{Name}` inside keys and string values are replaced by the
//! identifiers of the instance and its ancestors, plus the `{rb}` token for
//! the REST base (`/redfish/v1/`).

use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Wildcard token carrying the REST base URL
pub const REST_BASE_TOKEN: &str = "rb";

// =============================================================================
// Wildcards
// =============================================================================

/// Named substitution values for one instance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wildcards {
    values: BTreeMap<String, String>,
}

impl Wildcards {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Replace every known `{Name}` token in `text`
    pub fn substitute(&self, text: &str) -> String {
        if !text.contains('{') {
            return text.to_string();
        }
        let mut out = text.to_string();
        for (name, value) in &self.values {
            let token = format!("{{{name}}}");
            if out.contains(&token) {
                out = out.replace(&token, value);
            }
        }
        out
    }

    /// Substitute tokens throughout a JSON document, keys included
    pub fn apply(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.substitute(s)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.apply(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (self.substitute(k), self.apply(v)))
                    .collect::<Map<String, Value>>(),
            ),
            other => other.clone(),
        }
    }
}

// =============================================================================
// Template Generator
// =============================================================================

/// Produces the initial document of a new instance.
///
/// Generators hold no lifecycle logic; the engine decides when to call them
/// and what to do with the result.
pub trait TemplateGenerator: Send + Sync {
    /// Render a new instance document for `wildcards`
    fn instance(&self, wildcards: &Wildcards) -> Result<Value>;
}

/// Template backed by a static JSON skeleton
#[derive(Clone, PartialEq)]
pub struct JsonTemplate {
    skeleton: Value,
}

impl JsonTemplate {
    /// Wrap a skeleton document; it must be a JSON object
    pub fn new(skeleton: Value) -> Result<Self> {
        if !skeleton.is_object() {
            return Err(Error::Configuration(
                "instance template must be a JSON object".into(),
            ));
        }
        Ok(Self { skeleton })
    }

    pub fn skeleton(&self) -> &Value {
        &self.skeleton
    }
}

impl fmt::Debug for JsonTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonTemplate")
            .field("keys", &self.skeleton.as_object().map(Map::len).unwrap_or(0))
            .finish()
    }
}

impl TemplateGenerator for JsonTemplate {
    fn instance(&self, wildcards: &Wildcards) -> Result<Value> {
        Ok(wildcards.apply(&self.skeleton))
    }
}
