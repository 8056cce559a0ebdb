//! Implementation of the `mahabhuta process` command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio::fs;

use crate::domain::models::{EngineConfig, Metadata, Options};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::LoggerImpl;
use crate::services::builtin::partial::{self, FileRenderer};
use crate::services::builtin::ModuleRegistry;
use crate::services::convergence::Engine;
use crate::services::handler_group::Member;

#[derive(Args, Debug, Clone, Default)]
pub struct ProcessArgs {
    /// Markup file to process
    pub input: PathBuf,

    /// Write the result here instead of standard output
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Handler group to run (repeatable): metadata, partial
    #[arg(short, long = "module", num_args = 1..)]
    pub modules: Vec<String>,

    /// YAML file with engine configuration (parser, trace, max_passes, logging)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// YAML file with page metadata
    #[arg(long)]
    pub metadata: Option<PathBuf>,

    /// YAML file with options passed to every handler group
    #[arg(long)]
    pub options: Option<PathBuf>,

    /// Enable the <partial> handler group
    #[arg(long)]
    pub partials: bool,

    /// Directory searched for partial templates (repeatable)
    #[arg(long = "partials-dir", num_args = 1..)]
    pub partials_dirs: Vec<PathBuf>,

    /// Log elapsed time for every handler
    #[arg(long)]
    pub trace_performance: bool,

    /// Log every handler as it runs
    #[arg(long)]
    pub trace_processing: bool,

    /// Fail when the page has not converged after this many passes
    #[arg(long)]
    pub max_passes: Option<usize>,
}

/// Load configuration, then apply the command-line overrides.
pub fn load_config(args: &ProcessArgs) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    config.trace.performance |= args.trace_performance;
    config.trace.processing |= args.trace_processing;
    if args.max_passes.is_some() {
        config.max_passes = args.max_passes;
    }

    ConfigLoader::validate(&config)?;
    Ok(config)
}

async fn read_yaml<T>(
    path: &Path,
    what: &str,
    parse: fn(&str) -> serde_yaml::Result<T>,
) -> Result<T> {
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {what} file {}", path.display()))?;
    parse(&text).with_context(|| format!("Failed to parse {what} file {}", path.display()))
}

/// Build the top-level member list from `--module` names and `--partials`.
pub fn build_members(
    args: &ProcessArgs,
    options: &Options,
    registry: &ModuleRegistry,
) -> Result<Vec<Member>> {
    let mut members = Vec::with_capacity(args.modules.len() + 1);

    for name in &args.modules {
        let group = registry
            .build(name, options.clone())
            .with_context(|| {
                format!(
                    "No handler group named {name} (available: {})",
                    registry.names().join(", ")
                )
            })?
            .with_context(|| format!("Failed to build handler group {name}"))?;
        members.push(Member::Group(group));
    }

    if args.partials {
        let renderer = FileRenderer::new(args.partials_dirs.clone());
        let group = partial::group_with_renderer(options.clone(), Arc::new(renderer))?;
        members.push(Member::Group(group));
    }

    Ok(members)
}

/// Run the engine over the input file and return the processed markup.
pub async fn render(args: &ProcessArgs, config: EngineConfig) -> Result<String> {
    let mut metadata = match &args.metadata {
        Some(path) => read_yaml(path, "metadata", Metadata::from_yaml).await?,
        None => Metadata::new(),
    };
    let options = match &args.options {
        Some(path) => read_yaml(path, "options", Options::from_yaml).await?,
        None => Options::new(),
    };

    let input = fs::read_to_string(&args.input)
        .await
        .with_context(|| format!("Failed to read input file {}", args.input.display()))?;

    let members = build_members(args, &options, &ModuleRegistry::with_builtins())?;
    tracing::debug!(
        input = %args.input.display(),
        groups = members.len(),
        "Processing input"
    );

    let output = Engine::new(config)
        .process_members(input, &mut metadata, members)
        .await
        .with_context(|| format!("Failed to process {}", args.input.display()))?;
    Ok(output)
}

pub async fn execute(args: ProcessArgs) -> Result<()> {
    let config = load_config(&args)?;
    let _logger = LoggerImpl::init(&config.logging, config.trace)?;

    let output = render(&args, config).await?;

    match &args.output {
        Some(path) => fs::write(path, output)
            .await
            .with_context(|| format!("Failed to write output file {}", path.display()))?,
        None => println!("{output}"),
    }
    Ok(())
}
