use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::EngineConfig;

/// Project-local configuration file picked up by [`ConfigLoader::load`].
pub const DEFAULT_CONFIG_FILE: &str = "mahabhuta.yaml";

/// Prefix for environment overrides, e.g. `MAHABHUTA_PARSER__MODE=document`.
pub const ENV_PREFIX: &str = "MAHABHUTA_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_passes: {0}. Must be at least 1 when set")]
    InvalidMaxPasses(usize),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. `mahabhuta.yaml` in the working directory (optional)
    /// 3. Environment variables (`MAHABHUTA_*` prefix, `__` separates nesting)
    pub fn load() -> Result<EngineConfig> {
        let config: EngineConfig = Self::figment(Yaml::file(DEFAULT_CONFIG_FILE))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honoring environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<EngineConfig> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()).into());
        }

        let config: EngineConfig = Self::figment(Yaml::file(path))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment(file: figment::providers::Data<Yaml>) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(EngineConfig::default()))
            .merge(file)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &EngineConfig) -> Result<(), ConfigError> {
        if config.max_passes == Some(0) {
            return Err(ConfigError::InvalidMaxPasses(0));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}
