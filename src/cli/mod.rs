//! Command-line interface.

pub mod commands;
pub mod types;

use console::style;

use crate::domain::errors::EngineError;

pub use types::{Cli, Commands};

/// Report a failed command on stderr with its full cause chain.
pub fn handle_error(err: &anyhow::Error) {
    eprintln!("{} {err:#}", style("error:").red().bold());

    if let Some(engine_err) = err.chain().find_map(|e| e.downcast_ref::<EngineError>()) {
        let trail = engine_err.trail();
        if !trail.is_empty() {
            eprintln!("  {} {}", style("in:").dim(), trail.join(" > "));
        }
    }
}
