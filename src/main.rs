//! Mahabhuta CLI entry point.

use clap::Parser;

use mahabhuta::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Process(args) => mahabhuta::cli::commands::process::execute(args).await,
    };

    if let Err(err) = result {
        mahabhuta::cli::handle_error(&err);
        std::process::exit(1);
    }
}
