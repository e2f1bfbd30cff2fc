use std::time::Duration;

use vizexec::{ExecutionStatus, SubmissionRequest, SubmitError};

use super::{entries, sh_config, test_runner};

fn request(language: &str, kind: &str, code: &str) -> SubmissionRequest {
    SubmissionRequest {
        source_language: Some(language.to_owned()),
        library_hint: Some("plotly".to_owned()),
        visualization_kind: Some(kind.to_owned()),
        code: Some(code.to_owned()),
    }
}

#[tokio::test]
async fn test_interactive_python_publishes_html() {
    let (_dir, runner) = test_runner(sh_config(Some(10.0))).await;

    let outcome = runner
        .submit_request(request(
            "python",
            "Interactive",
            "printf '<html><body>plot</body></html>' > \"$1\"\n",
        ))
        .await
        .unwrap();

    let result = &outcome.result;
    assert_eq!(result.status, ExecutionStatus::Succeeded);
    let url = result.artifact_url.as_deref().unwrap();
    assert!(url.starts_with("http://localhost:3001/visuals/plot_"));
    assert!(url.ends_with(".html"));

    // Artifact is kept, script is gone
    assert!(outcome.artifact_path.exists());
    assert!(entries(runner.workspace().scripts_dir()).is_empty());
    assert_eq!(
        std::fs::read_to_string(&outcome.artifact_path).unwrap(),
        "<html><body>plot</body></html>"
    );
}

#[tokio::test]
async fn test_failing_r_script_reports_stderr_and_cleans_up() {
    let (_dir, runner) = test_runner(sh_config(Some(10.0))).await;

    let outcome = runner
        .submit_request(request(
            "r",
            "Static",
            "echo 'Error in plot(x): object x not found' >&2\nexit 1\n",
        ))
        .await
        .unwrap();

    let result = &outcome.result;
    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.exit_code, Some(1));
    assert!(result.artifact_url.is_none());
    assert!(result.diagnostics.as_deref().unwrap().contains("object x not found"));
    assert!(entries(runner.workspace().scripts_dir()).is_empty());
}

#[tokio::test]
async fn test_script_file_uses_language_extension() {
    let (_dir, runner) = test_runner(sh_config(Some(10.0))).await;

    // The script echoes its own path into the artifact
    let outcome = runner
        .submit_request(request("R", "static", "printf '%s' \"$0\" > \"$1\"\n"))
        .await
        .unwrap();

    assert_eq!(outcome.result.status, ExecutionStatus::Succeeded);
    let script_path = std::fs::read_to_string(&outcome.artifact_path).unwrap();
    assert!(script_path.ends_with(&format!("script_{}.R", outcome.id)));
    assert!(
        outcome
            .artifact_path
            .ends_with(format!("plot_{}.png", outcome.id))
    );
}

#[tokio::test]
async fn test_missing_code_touches_nothing() {
    let (_dir, runner) = test_runner(sh_config(Some(10.0))).await;

    let err = runner
        .submit_request(SubmissionRequest {
            source_language: Some("python".to_owned()),
            visualization_kind: Some("static".to_owned()),
            code: Some("   ".to_owned()),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, SubmitError::Validation(_)));
    assert!(err.to_string().contains("code"));
    assert!(entries(runner.workspace().scripts_dir()).is_empty());
    assert!(entries(runner.workspace().outputs_dir()).is_empty());
}

#[tokio::test]
async fn test_concurrent_submissions_do_not_collide() {
    let (_dir, runner) = test_runner(sh_config(Some(10.0))).await;
    let code = "printf 'data' > \"$1\"\n";

    let (a, b, c) = tokio::join!(
        runner.submit_request(request("python", "static", code)),
        runner.submit_request(request("python", "static", code)),
        runner.submit_request(request("r", "3d", code)),
    );
    let outcomes = [a.unwrap(), b.unwrap(), c.unwrap()];

    for outcome in &outcomes {
        assert_eq!(outcome.result.status, ExecutionStatus::Succeeded);
    }
    assert_ne!(outcomes[0].id, outcomes[1].id);
    assert_ne!(outcomes[0].artifact_path, outcomes[1].artifact_path);
    assert_ne!(outcomes[1].artifact_path, outcomes[2].artifact_path);
    assert_eq!(entries(runner.workspace().outputs_dir()).len(), 3);
    assert!(entries(runner.workspace().scripts_dir()).is_empty());
}

#[tokio::test]
async fn test_runaway_script_times_out() {
    let (_dir, runner) = test_runner(sh_config(Some(0.3))).await;

    let outcome = runner
        .submit_request(request("python", "static", "exec sleep 30\n"))
        .await
        .unwrap();

    let result = &outcome.result;
    assert_eq!(result.status, ExecutionStatus::TimedOut);
    assert!(result.wall_time < Duration::from_secs(10));
    assert!(entries(runner.workspace().scripts_dir()).is_empty());
}

#[tokio::test]
async fn test_background_process_cannot_hold_the_request_open() {
    let (_dir, runner) = test_runner(sh_config(Some(0.5))).await;
    let started = std::time::Instant::now();

    let outcome = runner
        .submit_request(request(
            "python",
            "static",
            "printf x > \"$1\"; sleep 8 & exit 0\n",
        ))
        .await
        .unwrap();

    assert_eq!(outcome.result.status, ExecutionStatus::Succeeded);
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(entries(runner.workspace().scripts_dir()).is_empty());
}
