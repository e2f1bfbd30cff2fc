//! Configuration file loading for vizexec
//!
//! Handles loading and parsing configuration files using the config crate.
//! Sources are layered: embedded defaults, then the file (if any), then
//! `VIZEXEC_*` environment variables.

use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};

use crate::config::{Config, ConfigError, ENV_PREFIX, EXAMPLE_CONFIG};
use crate::types::SourceLanguage;

impl Config {
    /// Load configuration from a file, applying environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load(Some(path.as_ref()))
    }

    /// Load configuration from the embedded defaults, an optional file, and
    /// the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder()
            .add_source(File::from_str(EXAMPLE_CONFIG, FileFormat::Toml));
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        for language in SourceLanguage::ALL {
            let interpreter = self.interpreter(language);
            if interpreter.command.is_empty() || interpreter.command[0].is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{language}' has empty interpreter command"
                )));
            }
            if interpreter.extension.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{language}' has empty extension"
                )));
            }
        }

        if self.outputs.image.is_empty() || self.outputs.document.is_empty() {
            return Err(ConfigError::Invalid(
                "output extensions must not be empty".to_owned(),
            ));
        }

        if !self.url_prefix.starts_with('/') || self.url_prefix.len() < 2 {
            return Err(ConfigError::Invalid(format!(
                "url_prefix '{}' must start with '/' and name a path",
                self.url_prefix
            )));
        }

        if self.public_url.is_empty() {
            return Err(ConfigError::Invalid("public_url is empty".to_owned()));
        }

        if let Some(timeout) = self.timeout
            && !(timeout.is_finite() && timeout > 0.0)
        {
            return Err(ConfigError::Invalid(format!(
                "timeout must be a positive number of seconds, got {timeout}"
            )));
        }

        if let Some(retention) = self.retention
            && !(retention.is_finite() && retention > 0.0)
        {
            return Err(ConfigError::Invalid(format!(
                "retention must be a positive number of seconds, got {retention}"
            )));
        }

        if !(self.sweep_interval.is_finite() && self.sweep_interval > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "sweep_interval must be a positive number of seconds, got {}",
                self.sweep_interval
            )));
        }

        Ok(())
    }
}
