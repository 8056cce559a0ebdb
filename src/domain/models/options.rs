//! Per-group configuration shared by every handler added to a group.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque configuration object supplied when a handler group is constructed.
///
/// The engine never reads it; handlers reach it through their
/// [`HandlerContext`](crate::domain::ports::HandlerContext).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(Map<String, Value>);

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML mapping into options. An empty document yields empty options.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        let value: Option<Value> = serde_yaml::from_str(text)?;
        Ok(value.map(Self::from_value).unwrap_or_default())
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// A non-empty string value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// A list of strings. A single string is treated as a one-element list.
    pub fn get_str_list(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Options {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
