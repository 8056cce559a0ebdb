use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure for a processing engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Tree parser configuration, forwarded to the tree adapter
    #[serde(default)]
    pub parser: ParserConfig,

    /// Diagnostic tracing toggles
    #[serde(default)]
    pub trace: TraceConfig,

    /// Optional upper bound on convergence passes (unbounded when unset)
    #[serde(default)]
    pub max_passes: Option<usize>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How markup text is turned into a tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    /// Document mode when the text opens with a doctype or `<html>`, fragment otherwise
    #[default]
    Auto,
    /// Full HTML document; bare content is wrapped in `html`/`head`/`body`
    Document,
    /// Fragment; nothing is synthesized around the content
    Fragment,
}

/// Tree parser configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ParserConfig {
    #[serde(default)]
    pub mode: ParseMode,

    /// Parse `<noscript>` content as raw text
    #[serde(default = "default_true")]
    pub scripting_enabled: bool,

    /// Drop the doctype node instead of keeping it in the tree
    #[serde(default)]
    pub drop_doctype: bool,

    /// Report parse errors with full detail
    #[serde(default)]
    pub exact_errors: bool,
}

const fn default_true() -> bool {
    true
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            mode: ParseMode::default(),
            scripting_enabled: default_true(),
            drop_doctype: false,
            exact_errors: false,
        }
    }
}

/// Diagnostic toggles threaded through one processing call
///
/// Neither flag changes control flow; they only raise the level at which
/// processing steps and timings are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TraceConfig {
    /// Log each member start/finish at info level
    #[serde(default)]
    pub processing: bool,

    /// Log elapsed time per member at info level
    #[serde(default)]
    pub performance: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format (json, pretty)
    #[serde(default)]
    pub format: LogFormat,

    /// Directory for log files (optional, if None logs only to stderr)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Log file rotation policy
    #[serde(default)]
    pub rotation: RotationPolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    Daily,
    Hourly,
    #[default]
    Never,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_dir: None,
            rotation: RotationPolicy::default(),
        }
    }
}
