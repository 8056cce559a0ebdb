//! Handler groups: ordered, nestable collections of tag handlers.
//!
//! A [`HandlerGroup`] runs its members in two phases on every pass, the main
//! list and then the final list. Members run strictly in registration order,
//! and the first failure aborts the group. The failure is wrapped with the
//! group's name and the failing member's label before it propagates, so an
//! error raised three groups deep reads
//! `outer caught error in HandlerGroup(inner): inner caught error in ...`.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{FutureExt, LocalBoxFuture};

use super::callback::CallbackMember;
use crate::domain::errors::{EngineError, EngineResult, HandlerKind};
use crate::domain::models::{DirtyFlag, Metadata, Options, TraceConfig};
use crate::domain::ports::{ElementReplacer, HandlerContext, PageTransform, TreeMutator};
use crate::infrastructure::dom::{Document, Selector};

/// Name given to groups built on the fly from an inline member list.
pub const INLINE_GROUP_NAME: &str = "inline";

// ---------------------------------------------------------------------------
// Member
// ---------------------------------------------------------------------------

/// One entry of a handler group.
///
/// Every shape a group accepts is normalized into one of these cases when it
/// is added, so dispatch never has to inspect what it was given.
pub enum Member {
    /// Replaces each matching element with the markup it returns.
    Replacer(Box<dyn ElementReplacer>),
    /// Edits the tree around each matching element.
    Mutator(Box<dyn TreeMutator>),
    /// Runs once over the whole tree.
    Page(Box<dyn PageTransform>),
    /// Nested group with its own name and options.
    Group(HandlerGroup),
    /// Closure signalled through a completion handle.
    Callback(CallbackMember),
    /// Anonymous list run as a nested group sharing the parent's options.
    Inline(Vec<Member>),
}

impl Member {
    /// Box an element replacer.
    pub fn replacer(handler: impl ElementReplacer + 'static) -> Self {
        Self::Replacer(Box::new(handler))
    }

    /// Box a tree mutator.
    pub fn mutator(handler: impl TreeMutator + 'static) -> Self {
        Self::Mutator(Box::new(handler))
    }

    /// Box a page transform.
    pub fn page(handler: impl PageTransform + 'static) -> Self {
        Self::Page(Box::new(handler))
    }

    /// Label used when a failure of this member is wrapped by its group.
    pub fn label(&self) -> String {
        match self {
            Self::Replacer(h) => format!("{}({})", HandlerKind::ElementReplacer, h.element_name()),
            Self::Mutator(h) => format!("{}({})", HandlerKind::TreeMutator, h.name()),
            Self::Page(h) => format!("{}({})", HandlerKind::PageTransform, h.name()),
            Self::Group(g) => format!("HandlerGroup({})", g.name()),
            Self::Callback(c) => format!("{}({})", HandlerKind::Callback, c.name()),
            Self::Inline(_) => format!("HandlerGroup({INLINE_GROUP_NAME})"),
        }
    }

    fn validate(&self, group: &str) -> EngineResult<()> {
        let invalid = |reason: String| EngineError::InvalidMember {
            group: group.to_string(),
            reason,
        };
        match self {
            Self::Replacer(h) => {
                if h.element_name().trim().is_empty() {
                    return Err(invalid("ElementReplacer has an empty element name".into()));
                }
                Selector::parse(h.selector())
                    .map(|_| ())
                    .map_err(|e| invalid(format!("{}: {e}", self.label())))
            }
            Self::Mutator(h) => Selector::parse(h.selector())
                .map(|_| ())
                .map_err(|e| invalid(format!("{}: {e}", self.label()))),
            Self::Page(h) if h.name().trim().is_empty() => {
                Err(invalid("PageTransform has an empty name".into()))
            }
            Self::Inline(members) => members.iter().try_for_each(|m| m.validate(group)),
            Self::Page(_) | Self::Group(_) | Self::Callback(_) => Ok(()),
        }
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group(g) => g.fmt(f),
            Self::Inline(members) => f.debug_tuple("Inline").field(members).finish(),
            _ => f.write_str(&self.label()),
        }
    }
}

impl From<HandlerGroup> for Member {
    fn from(group: HandlerGroup) -> Self {
        Self::Group(group)
    }
}

impl From<CallbackMember> for Member {
    fn from(callback: CallbackMember) -> Self {
        Self::Callback(callback)
    }
}

impl From<Vec<Member>> for Member {
    fn from(members: Vec<Member>) -> Self {
        Self::Inline(members)
    }
}

impl From<Box<dyn ElementReplacer>> for Member {
    fn from(handler: Box<dyn ElementReplacer>) -> Self {
        Self::Replacer(handler)
    }
}

impl From<Box<dyn TreeMutator>> for Member {
    fn from(handler: Box<dyn TreeMutator>) -> Self {
        Self::Mutator(handler)
    }
}

impl From<Box<dyn PageTransform>> for Member {
    fn from(handler: Box<dyn PageTransform>) -> Self {
        Self::Page(handler)
    }
}

// ---------------------------------------------------------------------------
// HandlerGroup
// ---------------------------------------------------------------------------

/// Named, ordered collection of members sharing one options object.
pub struct HandlerGroup {
    name: String,
    options: Arc<Options>,
    members: Vec<Member>,
    final_members: Vec<Member>,
}

impl HandlerGroup {
    /// Create an empty group owning `options`.
    pub fn new(name: impl Into<String>, options: Options) -> Self {
        Self::with_shared_options(name, Arc::new(options))
    }

    /// Create a group that shares `options` with other groups.
    pub fn with_shared_options(name: impl Into<String>, options: Arc<Options>) -> Self {
        Self {
            name: name.into(),
            options,
            members: Vec::new(),
            final_members: Vec::new(),
        }
    }

    /// Group name, used when wrapping member failures.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Options handed to every member.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Another handle to the options, for groups that share them.
    pub fn shared_options(&self) -> Arc<Options> {
        Arc::clone(&self.options)
    }

    /// Number of main-list members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether both lists are empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty() && self.final_members.is_empty()
    }

    /// Number of final-list members.
    pub fn len_final(&self) -> usize {
        self.final_members.len()
    }

    /// Append a member to the main list.
    pub fn add(&mut self, member: impl Into<Member>) -> EngineResult<&mut Self> {
        let member = member.into();
        member.validate(&self.name)?;
        self.members.push(member);
        Ok(self)
    }

    /// Append a member to the final list, which runs after the whole main list.
    pub fn add_final(&mut self, member: impl Into<Member>) -> EngineResult<&mut Self> {
        let member = member.into();
        member.validate(&self.name)?;
        self.final_members.push(member);
        Ok(self)
    }

    /// Replace the main list.
    pub fn set_members(&mut self, members: Vec<Member>) -> EngineResult<&mut Self> {
        for member in &members {
            member.validate(&self.name)?;
        }
        self.members = members;
        Ok(self)
    }

    /// Replace the final list.
    pub fn set_final_members(&mut self, members: Vec<Member>) -> EngineResult<&mut Self> {
        for member in &members {
            member.validate(&self.name)?;
        }
        self.final_members = members;
        Ok(self)
    }

    /// Run one pass of this group: the main list, then the final list.
    pub fn process<'a>(
        &'a self,
        doc: &'a mut Document,
        metadata: &'a mut Metadata,
        dirty: &'a DirtyFlag,
        trace: TraceConfig,
    ) -> LocalBoxFuture<'a, EngineResult<()>> {
        async move {
            let ctx = HandlerContext::new(&self.name, &self.options, trace);
            let started = Instant::now();

            run_list(&self.members, ctx, doc, metadata, dirty).await?;
            run_list(&self.final_members, ctx, doc, metadata, dirty).await?;

            tracing::trace!(
                group = %self.name,
                members = self.members.len(),
                final_members = self.final_members.len(),
                elapsed_ms = millis(started.elapsed()),
                "Handler group pass complete"
            );
            Ok(())
        }
        .boxed_local()
    }
}

impl fmt::Debug for HandlerGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerGroup")
            .field("name", &self.name)
            .field("members", &self.members)
            .field("final_members", &self.final_members)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

fn run_list<'a>(
    members: &'a [Member],
    ctx: HandlerContext<'a>,
    doc: &'a mut Document,
    metadata: &'a mut Metadata,
    dirty: &'a DirtyFlag,
) -> LocalBoxFuture<'a, EngineResult<()>> {
    async move {
        for member in members {
            let label = member.label();
            let started = Instant::now();
            log_processing(ctx, &label);

            run_member(member, ctx, doc, metadata, dirty)
                .await
                .map_err(|err| err.in_group(ctx.group_name(), label.as_str()))?;

            log_performance(ctx, &label, started);
        }
        Ok(())
    }
    .boxed_local()
}

fn run_member<'a>(
    member: &'a Member,
    ctx: HandlerContext<'a>,
    doc: &'a mut Document,
    metadata: &'a mut Metadata,
    dirty: &'a DirtyFlag,
) -> LocalBoxFuture<'a, EngineResult<()>> {
    async move {
        match member {
            Member::Replacer(handler) => {
                replace_all(handler.as_ref(), doc, metadata, dirty, &ctx).await
            }
            Member::Mutator(handler) => {
                mutate_all(handler.as_ref(), doc, metadata, dirty, &ctx).await
            }
            Member::Page(handler) => handler
                .process(doc, metadata, dirty, &ctx)
                .await
                .map_err(|e| EngineError::handler(HandlerKind::PageTransform, handler.name(), None, e)),
            Member::Group(group) => group.process(doc, metadata, dirty, ctx.trace()).await,
            Member::Callback(callback) => callback.invoke(doc, metadata, dirty).await,
            Member::Inline(members) => {
                let inline = HandlerContext::new(INLINE_GROUP_NAME, ctx.options(), ctx.trace());
                run_list(members, inline, doc, metadata, dirty).await
            }
        }
    }
    .boxed_local()
}

/// Run `handler` over every matching element, replacing each with its output.
///
/// Matches are captured before the first call, so elements introduced by a
/// replacement are only seen on the next pass.
pub async fn replace_all(
    handler: &dyn ElementReplacer,
    doc: &mut Document,
    metadata: &mut Metadata,
    dirty: &DirtyFlag,
    ctx: &HandlerContext<'_>,
) -> EngineResult<()> {
    let selector = Selector::parse(handler.selector())?;
    let matches = doc.select_matching(&selector);
    let total = matches.len();

    for (index, element) in matches.iter().enumerate() {
        let replacement = handler
            .process(element, metadata, dirty, ctx)
            .await
            .map_err(|e| {
                EngineError::handler(
                    HandlerKind::ElementReplacer,
                    handler.element_name(),
                    Some((index, total)),
                    e,
                )
            })?;
        doc.replace(element, replacement.as_deref().unwrap_or_default())?;
    }
    Ok(())
}

/// Run `handler` once per matching element, in document order.
pub async fn mutate_all(
    handler: &dyn TreeMutator,
    doc: &mut Document,
    metadata: &mut Metadata,
    dirty: &DirtyFlag,
    ctx: &HandlerContext<'_>,
) -> EngineResult<()> {
    let selector = Selector::parse(handler.selector())?;
    let matches = doc.select_matching(&selector);
    let total = matches.len();

    for (index, element) in matches.iter().enumerate() {
        handler
            .process(doc, element, metadata, dirty, ctx)
            .await
            .map_err(|e| {
                EngineError::handler(HandlerKind::TreeMutator, handler.name(), Some((index, total)), e)
            })?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Instrumentation
// ---------------------------------------------------------------------------

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn log_processing(ctx: HandlerContext<'_>, member: &str) {
    if ctx.trace().processing {
        tracing::info!(group = ctx.group_name(), member, "Processing member");
    } else {
        tracing::debug!(group = ctx.group_name(), member, "Processing member");
    }
}

fn log_performance(ctx: HandlerContext<'_>, member: &str, started: Instant) {
    let elapsed_ms = millis(started.elapsed());
    if ctx.trace().performance {
        tracing::info!(group = ctx.group_name(), member, elapsed_ms, "Member finished");
    } else {
        tracing::debug!(group = ctx.group_name(), member, elapsed_ms, "Member finished");
    }
}
