//! Handler ports - the contracts tag-processing code implements.

use async_trait::async_trait;

use crate::domain::models::{DirtyFlag, Metadata, Options, TraceConfig};
use crate::infrastructure::dom::{Document, Element};

/// What a handler can see of the group that is running it.
///
/// Handed to every invocation; handlers must not keep it past the call.
#[derive(Debug, Clone, Copy)]
pub struct HandlerContext<'a> {
    group: &'a str,
    options: &'a Options,
    trace: TraceConfig,
}

impl<'a> HandlerContext<'a> {
    pub const fn new(group: &'a str, options: &'a Options, trace: TraceConfig) -> Self {
        Self {
            group,
            options,
            trace,
        }
    }

    /// Name of the owning group.
    pub const fn group_name(&self) -> &'a str {
        self.group
    }

    /// Configuration shared by every handler in the owning group.
    pub const fn options(&self) -> &'a Options {
        self.options
    }

    pub const fn trace(&self) -> TraceConfig {
        self.trace
    }
}

/// Replaces each matched element with the markup it returns.
///
/// Returning `Ok(None)` removes the element.
#[async_trait(?Send)]
pub trait ElementReplacer {
    /// Identifying name used in errors and logs.
    fn element_name(&self) -> &str;

    /// Which elements to process. Defaults to the element name as a tag selector.
    fn selector(&self) -> &str {
        self.element_name()
    }

    async fn process(
        &self,
        element: &Element,
        metadata: &mut Metadata,
        dirty: &DirtyFlag,
        ctx: &HandlerContext<'_>,
    ) -> anyhow::Result<Option<String>>;
}

/// Mutates the tree once per matched element.
///
/// The handler owns every change it makes, including removing `element`.
#[async_trait(?Send)]
pub trait TreeMutator {
    fn selector(&self) -> &str;

    /// Identifying name used in errors and logs. Defaults to the selector.
    fn name(&self) -> &str {
        self.selector()
    }

    async fn process(
        &self,
        doc: &mut Document,
        element: &Element,
        metadata: &mut Metadata,
        dirty: &DirtyFlag,
        ctx: &HandlerContext<'_>,
    ) -> anyhow::Result<()>;
}

/// Runs once per pass against the whole tree.
#[async_trait(?Send)]
pub trait PageTransform {
    fn name(&self) -> &str;

    async fn process(
        &self,
        doc: &mut Document,
        metadata: &mut Metadata,
        dirty: &DirtyFlag,
        ctx: &HandlerContext<'_>,
    ) -> anyhow::Result<()>;
}
