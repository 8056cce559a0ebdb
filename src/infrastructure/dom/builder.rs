//! Builds `kuchikikiki` trees straight from html5ever tokens.
//!
//! Unlike the HTML5 tree builder, nothing is relocated: a custom tag written
//! in `<head>` stays in `<head>`, `/>` closes any element, and no
//! `html`/`head`/`body` scaffolding is implied. Only a handful of
//! well-known implicit closes are applied (`<li>` closes an open `<li>`,
//! a block element closes an open `<p>`, and so on).

use std::io;

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
    TokenizerResult,
};
use kuchikikiki::traits::TendrilSink;
use kuchikikiki::{Attribute, ElementData, ExpandedName, NodeDataRef, NodeRef};
use tracing::debug;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::ParserConfig;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const CLOSES_P: &[&str] = &[
    "address", "article", "aside", "blockquote", "details", "div", "dl", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "main", "nav", "ol", "p", "pre", "section", "table", "ul",
];

fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

/// Open elements that `opening` closes when it starts.
fn implied_closes(opening: &str) -> &'static [&'static str] {
    match opening {
        "li" => &["li"],
        "option" => &["option"],
        "optgroup" => &["optgroup", "option"],
        "dd" | "dt" => &["dt", "dd"],
        "tr" => &["tr", "th", "td"],
        "td" | "th" => &["th", "td"],
        "tbody" | "tfoot" => &["thead", "tbody"],
        "rt" | "rp" => &["rt", "rp"],
        "body" => &["head"],
        name if CLOSES_P.contains(&name) => &["p"],
        _ => &[],
    }
}

/// Parse `markup` into a detached document node.
pub fn parse(markup: &str, config: &ParserConfig) -> EngineResult<NodeRef> {
    let sink = TreeSink::new(config)?;
    let mut tokenizer = Tokenizer::new(
        sink,
        TokenizerOpts {
            exact_errors: config.exact_errors,
            ..Default::default()
        },
    );

    let mut input = BufferQueue::default();
    input.push_back(StrTendril::from_slice(markup));
    while let TokenizerResult::Script(()) = tokenizer.feed(&mut input) {}
    tokenizer.end();

    let sink = tokenizer.sink;
    if sink.errors > 0 {
        debug!(
            count = sink.errors,
            first = sink.first_error.as_deref().unwrap_or_default(),
            "markup parsed with recoverable errors"
        );
    }
    Ok(sink.root)
}

struct TreeSink {
    root: NodeRef,
    open: Vec<NodeRef>,
    // Element names are cloned off this node so they always carry the
    // qualified-name type of the tree crate's own html5ever.
    prototype: NodeDataRef<ElementData>,
    scripting_enabled: bool,
    drop_doctype: bool,
    errors: usize,
    first_error: Option<String>,
}

impl TreeSink {
    fn new(config: &ParserConfig) -> EngineResult<Self> {
        let prototype = kuchikikiki::parse_html()
            .one("")
            .select_first("html")
            .map_err(|()| EngineError::Parse(io::Error::other("no html element to name nodes after")))?;
        Ok(Self {
            root: NodeRef::new_document(),
            open: Vec::new(),
            prototype,
            scripting_enabled: config.scripting_enabled,
            drop_doctype: config.drop_doctype,
            errors: 0,
            first_error: None,
        })
    }

    fn current(&self) -> &NodeRef {
        self.open.last().unwrap_or(&self.root)
    }

    fn current_name(&self) -> Option<String> {
        self.open
            .last()
            .and_then(|n| n.as_element())
            .map(|e| e.name.local.to_string())
    }

    fn push_text(&mut self, text: &str) {
        let parent = self.current();
        if let Some(last) = parent.last_child() {
            if let Some(existing) = last.as_text() {
                existing.borrow_mut().push_str(text);
                return;
            }
        }
        parent.append(NodeRef::new_text(text));
    }

    fn create_element(&self, tag: &Tag) -> NodeRef {
        let mut name = self.prototype.name.clone();
        name.local = (&*tag.name).into();
        let attributes = tag.attrs.iter().map(|attr| {
            (
                ExpandedName::new("", &*attr.name.local),
                Attribute {
                    prefix: None,
                    value: attr.value.to_string(),
                },
            )
        });
        NodeRef::new_element(name, attributes)
    }

    fn start_tag(&mut self, tag: &Tag) -> TokenSinkResult<()> {
        let name: &str = &tag.name;
        let closes = implied_closes(name);
        while self
            .current_name()
            .is_some_and(|open| closes.contains(&open.as_str()))
        {
            self.open.pop();
        }

        let element = self.create_element(tag);
        self.current().append(element.clone());
        if tag.self_closing || is_void(name) {
            return TokenSinkResult::Continue;
        }
        self.open.push(element);

        match name {
            "script" => TokenSinkResult::RawData(RawKind::ScriptData),
            "style" | "xmp" | "iframe" | "noembed" | "noframes" => {
                TokenSinkResult::RawData(RawKind::Rawtext)
            }
            "noscript" if self.scripting_enabled => TokenSinkResult::RawData(RawKind::Rawtext),
            "title" | "textarea" => TokenSinkResult::RawData(RawKind::Rcdata),
            "plaintext" => TokenSinkResult::Plaintext,
            _ => TokenSinkResult::Continue,
        }
    }

    fn end_tag(&mut self, tag: &Tag) {
        let name: &str = &tag.name;
        let position = self.open.iter().rposition(|open| {
            open.as_element()
                .is_some_and(|e| &*e.name.local == name)
        });
        // Unmatched end tags are dropped.
        if let Some(index) = position {
            self.open.truncate(index);
        }
    }
}

impl TokenSink for TreeSink {
    type Handle = ();

    fn process_token(&mut self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        match token {
            Token::TagToken(tag) => match tag.kind {
                TagKind::StartTag => return self.start_tag(&tag),
                TagKind::EndTag => self.end_tag(&tag),
            },
            Token::CharacterTokens(text) => self.push_text(&text),
            Token::CommentToken(text) => self.current().append(NodeRef::new_comment(&*text)),
            Token::DoctypeToken(doctype) => {
                if !self.drop_doctype {
                    let text = |value: Option<StrTendril>| value.map(|v| v.to_string()).unwrap_or_default();
                    self.current().append(NodeRef::new_doctype(
                        text(doctype.name),
                        text(doctype.public_id),
                        text(doctype.system_id),
                    ));
                }
            }
            Token::ParseError(message) => {
                self.errors += 1;
                if self.first_error.is_none() {
                    self.first_error = Some(message.into_owned());
                }
            }
            Token::NullCharacterToken | Token::EOFToken => {}
        }
        TokenSinkResult::Continue
    }
}
