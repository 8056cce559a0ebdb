//! Built-in handler groups and the registry the CLI resolves `--module` names through.

pub mod metadata;
pub mod partial;

use std::borrow::Cow;
use std::collections::BTreeMap;

use url::Url;

use crate::domain::errors::EngineResult;
use crate::domain::models::Options;
use crate::services::handler_group::HandlerGroup;

/// Builds a handler group from the options shared by its handlers.
pub type GroupFactory = fn(Options) -> EngineResult<HandlerGroup>;

/// Named group factories.
#[derive(Debug, Clone)]
pub struct ModuleRegistry {
    factories: BTreeMap<String, GroupFactory>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// A registry holding the `metadata` and `partial` groups.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(metadata::GROUP_NAME, metadata::group);
        registry.register(partial::GROUP_NAME, partial::group);
        registry
    }

    /// Register `factory` under `name`, replacing any previous registration.
    pub fn register(&mut self, name: impl Into<String>, factory: GroupFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn get(&self, name: &str) -> Option<GroupFactory> {
        self.factories.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Build the group registered under `name`, or `None` when unknown.
    pub fn build(&self, name: &str, options: Options) -> Option<EngineResult<HandlerGroup>> {
        self.get(name).map(|factory| factory(options))
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Escape a value for use inside a double-quoted attribute.
pub(crate) fn escape_attr(value: &str) -> Cow<'_, str> {
    html_escape::encode_double_quoted_attribute(value)
}

/// Place `href` under the path component of `root_url`.
///
/// `join_under_root("https://example.com/blog/", "/feed.xml")` is
/// `/blog/feed.xml`. A root without a scheme is taken as a bare path. The
/// result is normalized: empty and `.` segments are dropped and `..` pops a
/// segment without climbing above the root.
pub(crate) fn join_under_root(root_url: &str, href: &str) -> String {
    let parsed = Url::parse(root_url).ok();
    let root_path = parsed.as_ref().map_or_else(
        || root_url.split(['?', '#']).next().unwrap_or_default(),
        Url::path,
    );

    let mut segments: Vec<&str> = Vec::new();
    for segment in root_path.split('/').chain(href.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut joined = String::new();
    if root_path.starts_with('/') || root_path.is_empty() {
        joined.push('/');
    }
    joined.push_str(&segments.join("/"));
    if href.ends_with('/') && !joined.ends_with('/') {
        joined.push('/');
    }
    joined
}
