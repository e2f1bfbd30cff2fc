use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::FileExtension;

/// Errors raised while validating an inbound submission
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
}

/// Wire payload for a submission, as posted by the editor.
///
/// Every field is optional here so that absent and empty values can be
/// reported together by [`Submission::from_request`]. The original field
/// names (`language`, `library`, `vizType`) are accepted as aliases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    #[serde(default, alias = "language")]
    pub source_language: Option<String>,

    #[serde(default, alias = "library")]
    pub library_hint: Option<String>,

    #[serde(default, alias = "vizType")]
    pub visualization_kind: Option<String>,

    #[serde(default)]
    pub code: Option<String>,
}

/// A validated submission
///
/// The language is kept as the raw string the caller sent. Whether it maps to
/// an interpreter is decided by the policy resolver, so that an unsupported
/// language is reported separately from a missing one.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Requested source language, as sent
    pub source_language: String,

    /// Advisory library hint (never used for control flow)
    pub library_hint: Option<String>,

    /// Requested visualization kind
    pub visualization_kind: VisualizationKind,

    /// Script contents
    pub code: String,
}

impl Submission {
    /// Validate a wire payload
    ///
    /// `sourceLanguage`, `visualizationKind` and `code` must be present and
    /// non-empty. All missing fields are named in the error.
    pub fn from_request(request: SubmissionRequest) -> Result<Self, ValidationError> {
        let SubmissionRequest {
            source_language,
            library_hint,
            visualization_kind,
            code,
        } = request;

        let source_language = source_language.filter(|s| !s.trim().is_empty());
        let visualization_kind = visualization_kind.filter(|s| !s.trim().is_empty());
        let code = code.filter(|s| !s.trim().is_empty());

        let mut missing = Vec::new();
        if source_language.is_none() {
            missing.push("sourceLanguage");
        }
        if visualization_kind.is_none() {
            missing.push("visualizationKind");
        }
        if code.is_none() {
            missing.push("code");
        }

        match (source_language, visualization_kind, code) {
            (Some(source_language), Some(kind), Some(code)) => Ok(Self {
                source_language,
                library_hint: library_hint.filter(|s| !s.is_empty()),
                visualization_kind: kind.parse().unwrap_or_default(),
                code,
            }),
            _ => Err(ValidationError::MissingFields(missing)),
        }
    }
}

/// Languages with a configured interpreter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLanguage {
    Python,
    R,
}

impl SourceLanguage {
    pub const ALL: [SourceLanguage; 2] = [SourceLanguage::Python, SourceLanguage::R];

    /// Lowercase identifier used in configuration and logs
    pub fn id(&self) -> &'static str {
        match self {
            SourceLanguage::Python => "python",
            SourceLanguage::R => "r",
        }
    }
}

impl FromStr for SourceLanguage {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "python" => Ok(SourceLanguage::Python),
            "r" => Ok(SourceLanguage::R),
            _ => Err(()),
        }
    }
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Kind of visualization the script is expected to produce
///
/// Only `interactive` and `3d` select a document. Anything else, including
/// unknown values, is treated as [`VisualizationKind::Static`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualizationKind {
    #[default]
    Static,
    Interactive,
    #[serde(rename = "3d")]
    ThreeD,
}

impl VisualizationKind {
    /// Whether the artifact is an interactive document rather than an image
    pub fn is_document(&self) -> bool {
        matches!(self, VisualizationKind::Interactive | VisualizationKind::ThreeD)
    }
}

impl FromStr for VisualizationKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "interactive" => VisualizationKind::Interactive,
            "3d" => VisualizationKind::ThreeD,
            _ => VisualizationKind::Static,
        })
    }
}

impl fmt::Display for VisualizationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisualizationKind::Static => f.write_str("static"),
            VisualizationKind::Interactive => f.write_str("interactive"),
            VisualizationKind::ThreeD => f.write_str("3d"),
        }
    }
}

/// Interpreter and file-extension choices for one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// Resolved language
    pub language: SourceLanguage,

    /// Interpreter program followed by its fixed arguments
    pub interpreter: Vec<String>,

    /// Extra environment for the interpreter
    pub env: Vec<(String, String)>,

    /// Extension of the staged script (e.g. "py", "R")
    pub script_extension: FileExtension,

    /// Extension of the expected artifact (e.g. "png", "html")
    pub output_extension: FileExtension,
}

/// Outcome classification of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Interpreter exited with code 0 (and the artifact exists, when verified)
    Succeeded,

    /// Interpreter exited nonzero, was killed by a signal, or failed to spawn
    Failed,

    /// Interpreter exceeded the configured wall time and was killed
    TimedOut,

    /// Interpreter exited with code 0 but did not write the artifact
    ArtifactMissing,
}

/// Result of an execution
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,

    /// Public URL of the artifact (only on success)
    pub artifact_url: Option<String>,

    /// Captured standard error, or a description of why nothing ran
    pub diagnostics: Option<String>,

    /// Exit code if the interpreter exited normally
    pub exit_code: Option<i32>,

    /// Wall clock time spent waiting for the interpreter
    pub wall_time: Duration,
}

impl ExecutionResult {
    /// Check if the execution succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, ExecutionStatus::Succeeded)
    }
}

impl Default for ExecutionResult {
    fn default() -> Self {
        Self {
            status: ExecutionStatus::Failed,
            artifact_url: None,
            diagnostics: None,
            exit_code: None,
            wall_time: Duration::ZERO,
        }
    }
}
