mod env;
mod types;


pub use types::*;

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::error::ConfigError;

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the resulting configuration fails [`Config::validate`].
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail later against a live backend.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding.dimensions == 0 {
            return Err(ConfigError::Invalid("embedding.dimensions must be > 0".into()));
        }
        if self.embedding.provider != EmbeddingProviderKind::Gemini
            && self.embedding.base_url.is_none()
        {
            return Err(ConfigError::Invalid(format!(
                "embedding.base_url is required for provider {}",
                self.embedding.provider.as_str()
            )));
        }
        if self.index.name.trim().is_empty() {
            return Err(ConfigError::Invalid("index.name must not be empty".into()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Invalid("llm.model must not be empty".into()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid(format!(
                "llm.temperature must be within 0..=2, got {}",
                self.llm.temperature
            )));
        }
        if self.ingest.batch_size == 0 {
            return Err(ConfigError::Invalid("ingest.batch_size must be > 0".into()));
        }
        if self.init.retry_initial_ms == 0 || self.init.retry_initial_ms > self.init.retry_max_ms
        {
            return Err(ConfigError::Invalid(
                "init.retry_initial_ms must be > 0 and <= init.retry_max_ms".into(),
            ));
        }
        Ok(())
    }
}

/// Config file location: `--config <path>`, then `VIDHI_CONFIG`, then
/// `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("VIDHI_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}
