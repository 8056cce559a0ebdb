//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};

use super::commands::process::ProcessArgs;

#[derive(Parser, Debug)]
#[command(name = "mahabhuta")]
#[command(about = "Mahabhuta - expand custom HTML tags until the page stops changing", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process an input file using the selected handler groups
    Process(ProcessArgs),
}
