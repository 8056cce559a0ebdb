//! Common test utilities for integration tests
//!
//! Small handlers shared by the engine, built-in and property tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use async_trait::async_trait;
use mahabhuta::{
    DirtyFlag, Document, Element, ElementReplacer, HandlerContext, Metadata, PageTransform,
};

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Shared, ordered record of handler invocations.
pub type CallLog = Rc<RefCell<Vec<String>>>;

pub fn call_log() -> CallLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Replaces every `<tag>` with fixed markup, optionally signalling dirty.
pub struct Stamp {
    tag: String,
    output: String,
    marks_dirty: bool,
    calls: Rc<Cell<usize>>,
    log: Option<CallLog>,
}

impl Stamp {
    pub fn new(tag: &str, output: &str) -> Self {
        Self {
            tag: tag.to_string(),
            output: output.to_string(),
            marks_dirty: false,
            calls: Rc::new(Cell::new(0)),
            log: None,
        }
    }

    #[must_use]
    pub fn dirty(mut self) -> Self {
        self.marks_dirty = true;
        self
    }

    #[must_use]
    pub fn logged(mut self, log: &CallLog) -> Self {
        self.log = Some(Rc::clone(log));
        self
    }

    /// Counter shared with the handler after it is moved into a group.
    pub fn calls(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.calls)
    }
}

#[async_trait(?Send)]
impl ElementReplacer for Stamp {
    fn element_name(&self) -> &str {
        &self.tag
    }

    async fn process(
        &self,
        _element: &Element,
        _metadata: &mut Metadata,
        dirty: &DirtyFlag,
        _ctx: &HandlerContext<'_>,
    ) -> anyhow::Result<Option<String>> {
        self.calls.set(self.calls.get() + 1);
        if let Some(log) = &self.log {
            log.borrow_mut().push(self.tag.clone());
        }
        if self.marks_dirty {
            dirty.set_dirty();
        }
        Ok(Some(self.output.clone()))
    }
}

/// Replaces `<tag>` with its `id` attribute as text, failing on the call
/// with zero-based index `fail_at`.
pub struct FailOn {
    tag: String,
    fail_at: usize,
    calls: Rc<Cell<usize>>,
}

impl FailOn {
    pub fn new(tag: &str, fail_at: usize) -> Self {
        Self {
            tag: tag.to_string(),
            fail_at,
            calls: Rc::new(Cell::new(0)),
        }
    }

    pub fn calls(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.calls)
    }
}

#[async_trait(?Send)]
impl ElementReplacer for FailOn {
    fn element_name(&self) -> &str {
        &self.tag
    }

    async fn process(
        &self,
        element: &Element,
        _metadata: &mut Metadata,
        _dirty: &DirtyFlag,
        _ctx: &HandlerContext<'_>,
    ) -> anyhow::Result<Option<String>> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        if call == self.fail_at {
            anyhow::bail!("boom");
        }
        Ok(Some(element.attr("id").unwrap_or_default()))
    }
}

/// Counts the passes it takes part in.
pub struct PassCounter {
    passes: Rc<Cell<usize>>,
}

impl PassCounter {
    pub fn new() -> Self {
        Self {
            passes: Rc::new(Cell::new(0)),
        }
    }

    pub fn passes(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.passes)
    }
}

#[async_trait(?Send)]
impl PageTransform for PassCounter {
    fn name(&self) -> &str {
        "pass-counter"
    }

    async fn process(
        &self,
        _doc: &mut Document,
        _metadata: &mut Metadata,
        _dirty: &DirtyFlag,
        _ctx: &HandlerContext<'_>,
    ) -> anyhow::Result<()> {
        self.passes.set(self.passes.get() + 1);
        Ok(())
    }
}
