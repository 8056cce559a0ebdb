//! Application metadata passed through every handler invocation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key/value bag supplied by the application for one processing call.
///
/// The engine hands it to every handler by `&mut` and never inspects it.
/// Handlers may read or write it freely; changes are visible to handlers
/// that run later in the same call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    /// Create an empty metadata bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML mapping into metadata. An empty document yields an empty bag.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        let value: Option<Value> = serde_yaml::from_str(text)?;
        Ok(value.map(Self::from_value).unwrap_or_default())
    }

    /// Build metadata from a JSON value. Non-object values become an empty bag.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Insert a value, returning the previous one if present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Metadata {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_yaml() {
        let metadata = Metadata::from_yaml("title: Hello\ncount: 3\n").unwrap();
        assert_eq!(metadata.get_str("title"), Some("Hello"));
        assert_eq!(metadata.get("count"), Some(&json!(3)));
    }

    #[test]
    fn test_from_empty_yaml() {
        let metadata = Metadata::from_yaml("").unwrap();
        assert!(metadata.is_empty());
    }

    #[test]
    fn test_insert_and_collect() {
        let mut metadata: Metadata = [("a", "1")].into_iter().collect();
        metadata.insert("b", json!({"nested": true}));
        assert_eq!(metadata.len(), 2);
        assert!(metadata.contains_key("b"));
    }
}
