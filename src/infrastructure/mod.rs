//! Infrastructure layer module
//!
//! - Markup tree adapter (kuchikikiki fed by the html5ever tokenizer)
//! - Configuration management
//! - Logging infrastructure

pub mod config;
pub mod dom;
pub mod logging;
