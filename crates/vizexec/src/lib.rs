//! A library for running user-supplied visualization scripts.
//!
//! Vizexec accepts a script in a supported language, runs it with the
//! matching interpreter, and publishes the file the script renders under a
//! stable URL. It is the engine behind the `vizexec` HTTP service and CLI.
//!
//! # Features
//!
//! - **Policy resolution**: maps a language and visualization kind to an interpreter and artifact format.
//! - **Per-submission staging**: each submission gets uniquely named script and artifact files.
//! - **Bounded execution**: optional wall-clock timeout with the interpreter killed on expiry.
//! - **Artifact publishing**: read-only static serving under a fixed URL prefix.
//! - **TOML configuration**: interpreter table, paths and limits, with environment overrides.

pub use config::{Config, ConfigError, EXAMPLE_CONFIG, FileExtension};
pub use policy::PolicyError;
pub use publish::Publisher;
pub use runner::{Runner, SubmissionOutcome, SubmitError};
pub use types::{
    ExecutionPlan, ExecutionResult, ExecutionStatus, SourceLanguage, Submission,
    SubmissionRequest, ValidationError, VisualizationKind,
};
pub use workspace::{StagedScript, SubmissionId, Workspace, WorkspaceError};

pub mod config;
pub mod policy;
pub mod publish;
pub mod runner;
pub mod server;
pub mod types;
pub mod workspace;
