//! Execution policy
//!
//! Maps a requested language and visualization kind to an [`ExecutionPlan`].
//! Resolution is a pure function of its inputs and the interpreter table; it
//! performs no I/O.

use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::types::{ExecutionPlan, SourceLanguage, VisualizationKind};

/// Errors that occur while resolving a plan
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
}

/// Resolve the execution plan for a language and visualization kind
///
/// Both inputs are compared case-insensitively. Any kind other than
/// `interactive` or `3d` resolves to the image format.
pub fn resolve(config: &Config, language: &str, kind: &str) -> Result<ExecutionPlan, PolicyError> {
    let language = resolve_language(language)?;
    let kind: VisualizationKind = kind.parse().unwrap_or_default();

    Ok(plan_for(config, language, kind))
}

/// Map a requested language to a supported one, case-insensitively
pub fn resolve_language(language: &str) -> Result<SourceLanguage, PolicyError> {
    language
        .parse()
        .map_err(|_| PolicyError::UnsupportedLanguage(language.to_owned()))
}

/// Build the plan for an already-parsed language and kind
pub fn plan_for(config: &Config, language: SourceLanguage, kind: VisualizationKind) -> ExecutionPlan {
    let interpreter = config.interpreter(language);

    let output_extension = if kind.is_document() {
        config.outputs.document.clone()
    } else {
        config.outputs.image.clone()
    };

    // The config loader may fold key case; variable names are uppercased.
    // Sorted so that identical inputs yield identical plans.
    let mut env: Vec<(String, String)> = interpreter
        .env
        .iter()
        .map(|(k, v)| (k.to_ascii_uppercase(), v.clone()))
        .collect();
    env.sort();

    let plan = ExecutionPlan {
        language,
        interpreter: interpreter.command.clone(),
        env,
        script_extension: interpreter.extension.clone(),
        output_extension,
    };

    debug!(%language, %kind, interpreter = ?plan.interpreter, output = %plan.output_extension, "resolved plan");
    plan
}
