use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub use crate::config::language::{FileExtension, Interpreter, Languages, OutputFormats};
use crate::types::SourceLanguage;

pub mod language;
mod loader;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../vizexec.example.toml");

/// Prefix of environment variables that override file values
pub const ENV_PREFIX: &str = "VIZEXEC";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid characters in file extension")]
    InvalidFileExtChars,

    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for vizexec
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address the HTTP service listens on
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Absolute base URL used to build artifact URLs
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// URL prefix under which the outputs area is served
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,

    /// Directory for staged scripts
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: PathBuf,

    /// Directory for artifacts
    #[serde(default = "default_outputs_dir")]
    pub outputs_dir: PathBuf,

    /// Wall time limit for one interpreter run, in seconds.
    ///
    /// `None` waits indefinitely.
    #[serde(default = "default_timeout")]
    pub timeout: Option<f64>,

    /// Require a non-empty artifact before reporting success
    #[serde(default = "default_verify_artifact")]
    pub verify_artifact: bool,

    /// Bytes of interpreter stderr kept as diagnostics
    #[serde(default = "default_max_diagnostics")]
    pub max_diagnostics: usize,

    /// Maximum artifact age in seconds before it is swept
    #[serde(default)]
    pub retention: Option<f64>,

    /// Seconds between retention sweeps while serving
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: f64,

    /// Artifact extensions by visualization kind
    #[serde(default)]
    pub outputs: OutputFormats,

    /// Interpreter table
    #[serde(default)]
    pub languages: Languages,
}

impl Config {
    /// Create a new config with the embedded defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the interpreter configured for a language
    pub fn interpreter(&self, language: SourceLanguage) -> &Interpreter {
        self.languages.get(language)
    }

    /// Wall time limit for one run
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs_f64)
    }

    /// Maximum artifact age, if retention is enabled
    pub fn retention_duration(&self) -> Option<Duration> {
        self.retention.map(Duration::from_secs_f64)
    }

    /// Time between retention sweeps
    pub fn sweep_period(&self) -> Duration {
        Duration::from_secs_f64(self.sweep_interval)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_bind() -> String {
    "0.0.0.0:3001".to_owned()
}

fn default_public_url() -> String {
    "http://localhost:3001".to_owned()
}

fn default_url_prefix() -> String {
    "/visuals".to_owned()
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("scripts")
}

fn default_outputs_dir() -> PathBuf {
    PathBuf::from("visualizations")
}

fn default_timeout() -> Option<f64> {
    Some(60.0)
}

fn default_verify_artifact() -> bool {
    true
}

fn default_max_diagnostics() -> usize {
    64 * 1024
}

fn default_sweep_interval() -> f64 {
    3600.0
}
