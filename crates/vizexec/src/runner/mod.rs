//! Script runner for vizexec
//!
//! Provides the end-to-end pipeline for one submission: validate, resolve the
//! plan, stage the script, run the interpreter, release the script, and
//! publish the artifact URL.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

pub use crate::runner::command::InterpreterCommand;
pub use crate::runner::execute::execute;
pub use crate::runner::process::{ProcessError, ProcessOutput, run_interpreter};

mod command;
mod execute;
mod process;

use crate::{
    config::Config,
    policy::{self, PolicyError},
    publish::Publisher,
    types::{ExecutionPlan, ExecutionResult, Submission, SubmissionRequest, ValidationError},
    workspace::{SubmissionId, Workspace, WorkspaceError},
};

/// Errors that stop a submission before the interpreter runs
///
/// Once the interpreter has been started, every outcome is reported through
/// [`ExecutionResult::status`] instead.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),
}

/// A completed submission
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    /// Identifier shared by the staged script and the artifact
    pub id: SubmissionId,

    /// Where the interpreter was asked to write the artifact
    pub artifact_path: PathBuf,

    pub result: ExecutionResult,
}

/// High-level runner for script execution
///
/// Cheap to clone; clones share configuration and filesystem areas.
#[derive(Debug, Clone)]
pub struct Runner {
    config: Arc<Config>,
    workspace: Workspace,
    publisher: Publisher,
}

impl Runner {
    /// Create a runner over an already prepared workspace
    pub fn new(config: Config, workspace: Workspace) -> Self {
        let publisher = Publisher::from_config(&config, workspace.outputs_dir());
        Self {
            config: Arc::new(config),
            workspace,
            publisher,
        }
    }

    /// Prepare the configured filesystem areas and create a runner
    pub async fn from_config(config: Config) -> Result<Self, WorkspaceError> {
        let workspace = Workspace::from_config(&config).await?;
        Ok(Self::new(config, workspace))
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Resolve the execution plan for a validated submission
    pub fn plan(&self, submission: &Submission) -> Result<ExecutionPlan, PolicyError> {
        let language = policy::resolve_language(&submission.source_language)?;
        Ok(policy::plan_for(
            &self.config,
            language,
            submission.visualization_kind,
        ))
    }

    /// Validate a wire payload and run it
    pub async fn submit_request(
        &self,
        request: SubmissionRequest,
    ) -> Result<SubmissionOutcome, SubmitError> {
        let submission = Submission::from_request(request)?;
        self.submit(&submission).await
    }

    /// Run one submission to completion
    ///
    /// Nothing is written to disk unless the plan resolves. The staged script
    /// is removed after the interpreter exits, whatever the outcome.
    #[instrument(skip_all, fields(
        language = %submission.source_language,
        kind = %submission.visualization_kind,
        library = submission.library_hint.as_deref().unwrap_or(""),
    ))]
    pub async fn submit(&self, submission: &Submission) -> Result<SubmissionOutcome, SubmitError> {
        let plan = self.plan(submission)?;

        let id = self.workspace.allocate();
        let artifact_path = self.workspace.artifact_path(&id, &plan.output_extension);
        let script = self
            .workspace
            .stage(&id, submission.code.as_bytes(), &plan.script_extension)
            .await?;

        let result = execute(
            &self.config,
            &self.publisher,
            &plan,
            &script,
            &artifact_path,
        )
        .await;

        self.workspace.release(script).await;

        if result.is_success() {
            info!(%id, url = ?result.artifact_url, "script executed successfully");
        } else {
            warn!(%id, status = ?result.status, exit_code = ?result.exit_code, "script execution failed");
        }

        Ok(SubmissionOutcome {
            id,
            artifact_path,
            result,
        })
    }
}
