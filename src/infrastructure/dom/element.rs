use std::fmt;

use kuchikikiki::{ElementData, NodeRef};
use serde_json::{Map, Value};

use crate::domain::errors::{EngineError, EngineResult};

/// A handle to one element of a [`Document`](super::Document).
///
/// Cloning is cheap and yields another handle to the same node. Handles are
/// only meaningful during the handler invocation that received them.
#[derive(Clone)]
pub struct Element {
    node: NodeRef,
}

impl Element {
    pub(crate) const fn new(node: NodeRef) -> Self {
        Self { node }
    }

    pub(crate) const fn node(&self) -> &NodeRef {
        &self.node
    }

    fn element_data(&self) -> Option<&ElementData> {
        self.node.as_element()
    }

    /// Lowercase local tag name.
    pub fn name(&self) -> &str {
        self.element_data().map_or("", |e| &*e.name.local)
    }

    /// Attribute value, if the attribute is present.
    pub fn attr(&self, key: &str) -> Option<String> {
        self.element_data()?
            .attributes
            .borrow()
            .get(key)
            .map(str::to_string)
    }

    /// Attribute value, treating an empty value the same as a missing one.
    pub fn non_empty_attr(&self, key: &str) -> Option<String> {
        self.attr(key).filter(|v| !v.is_empty())
    }

    /// Whether the attribute is present, even with an empty value.
    pub fn has_attr(&self, key: &str) -> bool {
        self.element_data()
            .is_some_and(|e| e.attributes.borrow().contains(key))
    }

    /// Attributes in source order.
    pub fn attrs(&self) -> Vec<(String, String)> {
        self.element_data()
            .map(|e| {
                e.attributes
                    .borrow()
                    .map
                    .iter()
                    .map(|(name, attr)| (name.local.to_string(), attr.value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Set an attribute, replacing any existing value.
    pub fn set_attr(&self, key: &str, value: &str) {
        if let Some(e) = self.element_data() {
            e.attributes.borrow_mut().insert(key, value.to_string());
        }
    }

    /// Remove an attribute, reporting whether it was present.
    pub fn remove_attr(&self, key: &str) -> bool {
        self.element_data()
            .is_some_and(|e| e.attributes.borrow_mut().remove(key).is_some())
    }

    /// Whether `class_name` is one of the whitespace-separated classes.
    pub fn has_class(&self, class_name: &str) -> bool {
        self.attr("class")
            .is_some_and(|c| c.split_ascii_whitespace().any(|part| part == class_name))
    }

    /// Add `class_name` unless it is already present.
    pub fn add_class(&self, class_name: &str) {
        if self.has_class(class_name) {
            return;
        }
        let updated = match self.attr("class") {
            Some(existing) if !existing.trim().is_empty() => {
                format!("{} {class_name}", existing.trim())
            }
            _ => class_name.to_string(),
        };
        self.set_attr("class", &updated);
    }

    /// Serialized children.
    pub fn inner_html(&self) -> EngineResult<String> {
        // Raw-text children would be escaped when serialized on their own.
        if matches!(self.name(), "script" | "style") {
            return Ok(self.text());
        }
        let mut bytes = Vec::new();
        for child in self.node.children() {
            child.serialize(&mut bytes).map_err(EngineError::Serialize)?;
        }
        into_string(bytes)
    }

    /// Serialized element including its own tags.
    pub fn outer_html(&self) -> EngineResult<String> {
        let mut bytes = Vec::new();
        self.node
            .serialize(&mut bytes)
            .map_err(EngineError::Serialize)?;
        into_string(bytes)
    }

    /// Concatenated text of every descendant text node.
    pub fn text(&self) -> String {
        self.node.text_contents()
    }

    /// The `data-*` attributes, keyed by the camel-cased suffix.
    ///
    /// Values that parse as JSON are decoded, everything else is kept as a
    /// string: `data-count="3"` yields `count: 3`, `data-page-title="Home"`
    /// yields `pageTitle: "Home"`.
    pub fn data(&self) -> Map<String, Value> {
        self.attrs()
            .into_iter()
            .filter_map(|(key, value)| {
                let suffix = key.strip_prefix("data-")?;
                if suffix.is_empty() {
                    return None;
                }
                let decoded = serde_json::from_str::<Value>(&value)
                    .unwrap_or_else(|_| Value::String(value.clone()));
                Some((camel_case(suffix), decoded))
            })
            .collect()
    }

    /// The enclosing element, if any.
    pub fn parent(&self) -> Option<Self> {
        self.node
            .parent()
            .filter(|p| p.as_element().is_some())
            .map(Self::new)
    }

    /// Detach this element (and its subtree) from the tree.
    pub fn remove(&self) {
        self.node.detach();
    }

    /// Whether both handles point at the same node.
    pub fn is_same(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("name", &self.name())
            .field("attrs", &self.attrs())
            .finish()
    }
}

fn into_string(bytes: Vec<u8>) -> EngineResult<String> {
    String::from_utf8(bytes).map_err(|e| EngineError::Serialize(std::io::Error::other(e)))
}

fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '-' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}
