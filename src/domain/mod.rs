//! Domain layer for the tag-processing engine
//!
//! This module contains the core models, errors and handler contracts.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{EngineError, EngineResult, HandlerKind, RenderError};
