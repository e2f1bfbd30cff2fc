//! Execution step
//!
//! Runs the resolved interpreter against a staged script and classifies the
//! outcome.

use std::path::Path;

use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::publish::Publisher;
use crate::runner::command::InterpreterCommand;
use crate::runner::process::{ProcessError, ProcessOutput, run_interpreter};
use crate::types::{ExecutionPlan, ExecutionResult, ExecutionStatus};
use crate::workspace::StagedScript;

/// Run a staged script with the interpreter named in `plan`
///
/// The interpreter receives the script path and `artifact` as its two
/// trailing arguments and is responsible for writing the artifact. There is no
/// retry: a failed run may already have written partial output.
#[instrument(skip_all, fields(id = %script.id(), language = %plan.language))]
pub async fn execute(
    config: &Config,
    publisher: &Publisher,
    plan: &ExecutionPlan,
    script: &StagedScript,
    artifact: &Path,
) -> ExecutionResult {
    let command = InterpreterCommand::from_plan(plan)
        .script(script.path())
        .artifact(artifact);

    info!(command = %command.display(), "executing script");

    let output =
        match run_interpreter(&command, config.timeout_duration(), config.max_diagnostics).await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "interpreter run did not complete");
                return ExecutionResult {
                    status: ExecutionStatus::Failed,
                    diagnostics: Some(run_error_diagnostics(
                        command.program().unwrap_or_default(),
                        &e,
                    )),
                    ..Default::default()
                };
            }
        };

    if !output.stdout.is_empty() {
        debug!(stdout = %String::from_utf8_lossy(&output.stdout), "interpreter stdout");
    }

    classify(config, publisher, output, artifact).await
}

async fn classify(
    config: &Config,
    publisher: &Publisher,
    output: ProcessOutput,
    artifact: &Path,
) -> ExecutionResult {
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let exit_code = output.status.and_then(|s| s.code());
    let mut result = ExecutionResult {
        exit_code,
        wall_time: output.wall_time,
        ..Default::default()
    };

    if output.timed_out {
        let limit = config.timeout.unwrap_or_default();
        result.status = ExecutionStatus::TimedOut;
        result.diagnostics = Some(with_summary(
            format!("interpreter did not finish within {limit}s and was killed"),
            &stderr,
        ));
        return result;
    }

    let succeeded = output.status.is_some_and(|s| s.success());
    if !succeeded {
        let summary = match (exit_code, output.status) {
            (Some(code), _) => format!("interpreter exited with status {code}"),
            (None, Some(status)) => format!("interpreter terminated abnormally ({status})"),
            (None, None) => "interpreter terminated abnormally".to_owned(),
        };
        result.status = ExecutionStatus::Failed;
        result.diagnostics = Some(if stderr.trim().is_empty() {
            summary
        } else {
            stderr
        });
        return result;
    }

    if config.verify_artifact && !artifact_written(artifact).await {
        result.status = ExecutionStatus::ArtifactMissing;
        result.diagnostics = Some(with_summary(
            format!(
                "interpreter exited successfully but did not write {}",
                artifact.display()
            ),
            &stderr,
        ));
        return result;
    }

    result.status = ExecutionStatus::Succeeded;
    result.artifact_url = publisher.url_for(artifact);
    result
}

fn run_error_diagnostics(program: &str, error: &ProcessError) -> String {
    match error {
        ProcessError::EmptyCommand => "no interpreter command configured".to_owned(),
        ProcessError::Spawn(e) => format!("failed to start interpreter `{program}`: {e}"),
        ProcessError::Wait(e) => {
            format!("interpreter `{program}` was started but could not be waited on: {e}")
        }
    }
}

/// Whether the artifact exists as a non-empty regular file
async fn artifact_written(artifact: &Path) -> bool {
    tokio::fs::metadata(artifact)
        .await
        .is_ok_and(|metadata| metadata.is_file() && metadata.len() > 0)
}

fn with_summary(summary: String, stderr: &str) -> String {
    if stderr.trim().is_empty() {
        summary
    } else {
        format!("{summary}\n{stderr}")
    }
}
