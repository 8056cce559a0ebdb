//! Mahabhuta - fixed-point HTML tag expansion
//!
//! Mahabhuta parses a page once and runs groups of tag handlers over the tree
//! until a full pass completes without any handler signalling that it exposed
//! new work. Handlers come in three shapes:
//!
//! - [`ElementReplacer`]: swaps each matching element for the markup it returns
//! - [`TreeMutator`]: edits the tree freely for each matching element
//! - [`PageTransform`]: runs once per pass against the whole page
//!
//! Handlers are collected into nestable [`HandlerGroup`]s that share an
//! [`Options`] object, and an [`Engine`] drives the groups to convergence.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and the handler contracts
//! - **Service Layer** (`services`): handler groups, the convergence driver and built-in handlers
//! - **Infrastructure Layer** (`infrastructure`): markup tree adapter, configuration, logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use async_trait::async_trait;
//! use mahabhuta::{
//!     DirtyFlag, Element, ElementReplacer, HandlerContext, HandlerGroup, Member, Metadata,
//!     Options,
//! };
//!
//! struct Greeting;
//!
//! #[async_trait(?Send)]
//! impl ElementReplacer for Greeting {
//!     fn element_name(&self) -> &str {
//!         "greeting"
//!     }
//!
//!     async fn process(
//!         &self,
//!         element: &Element,
//!         _metadata: &mut Metadata,
//!         _dirty: &DirtyFlag,
//!         _ctx: &HandlerContext<'_>,
//!     ) -> anyhow::Result<Option<String>> {
//!         let name = element.attr("name").unwrap_or_else(|| "world".to_string());
//!         Ok(Some(format!("<p>Hello, {name}!</p>")))
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let mut group = HandlerGroup::new("site", Options::new());
//!     group.add(Member::replacer(Greeting))?;
//!
//!     let html = mahabhuta::process_async(
//!         r#"<greeting name="Ada"></greeting>"#,
//!         &mut Metadata::new(),
//!         &group,
//!     )
//!     .await?;
//!     assert_eq!(html, "<p>Hello, Ada!</p>");
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{EngineError, EngineResult, HandlerKind, RenderError};
pub use domain::models::{DirtyFlag, EngineConfig, Metadata, Options, ParseMode, ParserConfig, TraceConfig};
pub use domain::ports::{
    ElementReplacer, HandlerContext, PageTransform, PartialRenderer, TemplateEngine, TreeMutator,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::dom::{Document, Element, Selector};
pub use services::{
    process1, process_async, CallbackMember, Completion, Engine, HandlerGroup, Input, Member,
    ModuleRegistry,
};
