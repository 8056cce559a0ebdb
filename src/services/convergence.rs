//! The convergence driver.
//!
//! Parses the input once, then runs the top-level group over the same tree
//! pass after pass until a pass finishes without anything signalling dirty.
//! Each pass gets a fresh [`DirtyFlag`], so only changes made during the most
//! recent pass decide whether another one runs.

use std::time::Instant;

use tracing::instrument;

use super::handler_group::{millis, HandlerGroup, Member};
use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{DirtyFlag, EngineConfig, Metadata, Options};
use crate::infrastructure::dom::Document;

/// Name of the group built around a raw member list.
pub const MASTER_GROUP_NAME: &str = "master";

/// What to process: markup text or an already parsed tree.
#[derive(Debug)]
pub enum Input {
    Markup(String),
    Tree(Document),
}

impl From<String> for Input {
    fn from(text: String) -> Self {
        Self::Markup(text)
    }
}

impl From<&str> for Input {
    fn from(text: &str) -> Self {
        Self::Markup(text.to_string())
    }
}

impl From<&String> for Input {
    fn from(text: &String) -> Self {
        Self::Markup(text.clone())
    }
}

impl From<Document> for Input {
    fn from(doc: Document) -> Self {
        Self::Tree(doc)
    }
}

/// Runs handler groups over markup until the tree stops changing.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub const fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Process `input` with `group` until no pass signals dirty, then serialize.
    ///
    /// The first failing member aborts the whole call; no partial output is
    /// produced.
    #[instrument(skip_all, fields(group = %group.name()))]
    pub async fn process(
        &self,
        input: impl Into<Input>,
        metadata: &mut Metadata,
        group: &HandlerGroup,
    ) -> EngineResult<String> {
        let started = Instant::now();
        let mut doc = match input.into() {
            Input::Markup(text) => Document::parse_with(&text, &self.config.parser)?,
            Input::Tree(doc) => doc,
        };

        let mut passes = 0usize;
        loop {
            if let Some(limit) = self.config.max_passes {
                if passes >= limit {
                    tracing::warn!(max_passes = limit, "Processing did not converge");
                    return Err(EngineError::PassLimitExceeded(limit));
                }
            }
            passes += 1;

            let dirty = DirtyFlag::new();
            let pass_started = Instant::now();
            group
                .process(&mut doc, metadata, &dirty, self.config.trace)
                .await?;

            tracing::debug!(
                pass = passes,
                dirty = dirty.is_dirty(),
                elapsed_ms = millis(pass_started.elapsed()),
                "Pass complete"
            );

            if !dirty.is_dirty() {
                break;
            }
        }

        let html = doc.to_html()?;

        let elapsed_ms = millis(started.elapsed());
        if self.config.trace.performance {
            tracing::info!(passes, elapsed_ms, "Processing converged");
        } else {
            tracing::debug!(passes, elapsed_ms, "Processing converged");
        }
        Ok(html)
    }

    /// Process with a raw member list, wrapped in a group named `master`.
    pub async fn process_members(
        &self,
        input: impl Into<Input>,
        metadata: &mut Metadata,
        members: Vec<Member>,
    ) -> EngineResult<String> {
        let mut group = HandlerGroup::new(MASTER_GROUP_NAME, Options::new());
        group.set_members(members)?;
        self.process(input, metadata, &group).await
    }

    /// Process with a single member.
    pub async fn process_one(
        &self,
        input: impl Into<Input>,
        metadata: &mut Metadata,
        member: impl Into<Member>,
    ) -> EngineResult<String> {
        self.process_members(input, metadata, vec![member.into()])
            .await
    }

    /// Process and hand the outcome to `done` instead of returning it.
    pub async fn process_with_callback<F>(
        &self,
        input: impl Into<Input>,
        metadata: &mut Metadata,
        group: &HandlerGroup,
        done: F,
    ) where
        F: FnOnce(EngineResult<String>),
    {
        done(self.process(input, metadata, group).await);
    }
}

/// Process `input` with `group` using the default engine configuration.
pub async fn process_async(
    input: impl Into<Input>,
    metadata: &mut Metadata,
    group: &HandlerGroup,
) -> EngineResult<String> {
    Engine::default().process(input, metadata, group).await
}

/// Process `input` with one member using the default engine configuration.
pub async fn process1(
    input: impl Into<Input>,
    metadata: &mut Metadata,
    member: impl Into<Member>,
) -> EngineResult<String> {
    Engine::default().process_one(input, metadata, member).await
}
