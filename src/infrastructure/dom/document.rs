use std::fmt;

use kuchikikiki::traits::*;
use kuchikikiki::{NodeRef, Selectors};
use tracing::trace;

use super::builder;
use super::element::Element;
use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{ParseMode, ParserConfig};

/// A compiled CSS selector.
pub struct Selector {
    source: String,
    compiled: Selectors,
}

impl Selector {
    /// Compile `source`, rejecting syntax the matcher does not support.
    pub fn parse(source: &str) -> EngineResult<Self> {
        let compiled = Selectors::compile(source)
            .map_err(|()| EngineError::InvalidSelector(source.to_string()))?;
        Ok(Self {
            source: source.to_string(),
            compiled,
        })
    }

    /// The selector text as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `element` matches.
    pub fn matches(&self, element: &Element) -> bool {
        element
            .node()
            .clone()
            .into_element_ref()
            .is_some_and(|e| self.compiled.matches(&e))
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Selector").field(&self.source).finish()
    }
}

/// A parsed, mutable markup tree.
///
/// Markup is kept where it is written in both modes. Document mode only
/// differs when the input has no `html` element at the top: the content is
/// then wrapped in `<html><head></head><body>` scaffolding.
pub struct Document {
    root: NodeRef,
    mode: ParseMode,
    config: ParserConfig,
}

impl Document {
    /// Parse with the default parser configuration.
    pub fn parse(markup: &str) -> EngineResult<Self> {
        Self::parse_with(markup, &ParserConfig::default())
    }

    /// Parse with an explicit parser configuration.
    pub fn parse_with(markup: &str, config: &ParserConfig) -> EngineResult<Self> {
        let mode = resolve_mode(markup, config.mode);
        let root = builder::parse(markup, config)?;
        if mode == ParseMode::Document {
            scaffold(&root, config)?;
        }
        trace!(?mode, "parsed markup");
        Ok(Self {
            root,
            mode,
            config: config.clone(),
        })
    }

    /// The resolved parse mode, never [`ParseMode::Auto`].
    pub const fn mode(&self) -> ParseMode {
        self.mode
    }

    /// Serialize the whole tree.
    pub fn to_html(&self) -> EngineResult<String> {
        let mut bytes = Vec::new();
        self.root
            .serialize(&mut bytes)
            .map_err(EngineError::Serialize)?;
        String::from_utf8(bytes).map_err(|e| EngineError::Serialize(std::io::Error::other(e)))
    }

    /// Elements matching `selector`, in document order.
    pub fn select(&self, selector: &str) -> EngineResult<Vec<Element>> {
        let selector = Selector::parse(selector)?;
        Ok(self.select_matching(&selector))
    }

    /// Elements matching an already compiled selector, in document order.
    pub fn select_matching(&self, selector: &Selector) -> Vec<Element> {
        self.root
            .descendants()
            .elements()
            .map(|e| Element::new(e.as_node().clone()))
            .filter(|e| selector.matches(e))
            .collect()
    }

    /// First element matching `selector`, in document order.
    pub fn select_first(&self, selector: &str) -> EngineResult<Option<Element>> {
        Ok(self.select(selector)?.into_iter().next())
    }

    /// The first `head` element.
    pub fn head(&self) -> Option<Element> {
        self.first_by_name("head")
    }

    /// The first `body` element.
    pub fn body(&self) -> Option<Element> {
        self.first_by_name("body")
    }

    fn first_by_name(&self, name: &str) -> Option<Element> {
        self.root
            .descendants()
            .elements()
            .find(|e| &*e.name.local == name)
            .map(|e| Element::new(e.as_node().clone()))
    }

    /// Whether `element` is still part of this tree.
    pub fn contains(&self, element: &Element) -> bool {
        element
            .node()
            .inclusive_ancestors()
            .any(|ancestor| ancestor == self.root)
    }

    /// Replace `element` with the nodes parsed from `markup`.
    ///
    /// An empty string removes the element. Replacing an element that is no
    /// longer attached to a parent does nothing.
    pub fn replace(&mut self, element: &Element, markup: &str) -> EngineResult<()> {
        let target = element.node();
        if target.parent().is_none() {
            return Ok(());
        }
        for node in self.parse_nodes(markup)? {
            target.insert_before(node);
        }
        target.detach();
        Ok(())
    }

    /// Parse `markup` and append the resulting nodes as the last children of `parent`.
    pub fn append_html(&mut self, parent: &Element, markup: &str) -> EngineResult<()> {
        for node in self.parse_nodes(markup)? {
            parent.node().append(node);
        }
        Ok(())
    }

    /// Detach `element` and its subtree.
    pub fn remove(&mut self, element: &Element) {
        element.remove();
    }

    fn parse_nodes(&self, markup: &str) -> EngineResult<Vec<NodeRef>> {
        if markup.is_empty() {
            return Ok(Vec::new());
        }
        let holder = builder::parse(markup, &self.config)?;
        Ok(take_children(&holder))
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

fn take_children(holder: &NodeRef) -> Vec<NodeRef> {
    let children: Vec<NodeRef> = holder.children().collect();
    for child in &children {
        child.detach();
    }
    children
}

fn resolve_mode(markup: &str, requested: ParseMode) -> ParseMode {
    if requested != ParseMode::Auto {
        return requested;
    }
    let head: String = markup
        .trim_start()
        .chars()
        .take(9)
        .collect::<String>()
        .to_ascii_lowercase();
    if head.starts_with("<!doctype") || head.starts_with("<html") {
        ParseMode::Document
    } else {
        ParseMode::Fragment
    }
}

// Wrap bare content in html/head/body. A page that has its own `html`
// element is left exactly as written.
fn scaffold(root: &NodeRef, config: &ParserConfig) -> EngineResult<()> {
    if root.children().elements().any(|e| &*e.name.local == "html") {
        return Ok(());
    }
    let content: Vec<NodeRef> = root
        .children()
        .filter(|child| child.as_doctype().is_none())
        .collect();

    let shell = builder::parse("<html><head></head><body></body></html>", config)?;
    let html = take_children(&shell)
        .into_iter()
        .next()
        .ok_or_else(|| EngineError::Parse(std::io::Error::other("empty document scaffold")))?;
    let body = html
        .select_first("body")
        .map_err(|()| EngineError::Parse(std::io::Error::other("document scaffold has no body")))?;
    for node in content {
        body.as_node().append(node);
    }
    root.append(html);
    Ok(())
}
