//! Port trait definitions
//!
//! - Handler contracts: ElementReplacer, TreeMutator, PageTransform
//! - Rendering contracts used by the partial handler: PartialRenderer, TemplateEngine

pub mod handler;
pub mod renderer;

pub use handler::{ElementReplacer, HandlerContext, PageTransform, TreeMutator};
pub use renderer::{PartialRenderer, TemplateEngine};
