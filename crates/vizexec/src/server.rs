//! HTTP surface
//!
//! - `POST /run-script` runs a submission and answers once the interpreter
//!   has exited.
//! - `GET <url_prefix>/<file>` serves artifacts.
//! - `GET /health` is a liveness probe.

use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::runner::{Runner, SubmitError};
use crate::types::{ExecutionStatus, SubmissionRequest};
use crate::workspace::Workspace;

pub const SUCCESS_MESSAGE: &str = "Script executed successfully";

/// Body of a successful `POST /run-script`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunScriptResponse {
    pub message: String,
    pub file_url: String,
}

/// Body of every error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Errors surfaced to HTTP clients
#[derive(Debug)]
pub enum ApiError {
    /// Body is not a JSON object of the expected shape
    MalformedBody(String),
    Submit(SubmitError),
    Execution {
        status: ExecutionStatus,
        details: Option<String>,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            ApiError::MalformedBody(message) => (
                StatusCode::BAD_REQUEST,
                "Malformed request body".to_owned(),
                Some(message),
            ),
            ApiError::Submit(e @ (SubmitError::Validation(_) | SubmitError::Policy(_))) => {
                (StatusCode::BAD_REQUEST, e.to_string(), None)
            }
            ApiError::Submit(SubmitError::Workspace(e)) => {
                error!(error = %e, "failed to stage submission");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to stage script".to_owned(),
                    None,
                )
            }
            ApiError::Execution { status, details } => {
                let (code, error) = match status {
                    ExecutionStatus::TimedOut => (StatusCode::GATEWAY_TIMEOUT, "Execution timed out"),
                    ExecutionStatus::ArtifactMissing => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "Artifact missing")
                    }
                    ExecutionStatus::Failed | ExecutionStatus::Succeeded => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "Execution failed")
                    }
                };
                (code, error.to_owned(), details)
            }
        };

        (status, Json(ErrorResponse { error, details })).into_response()
    }
}

impl From<SubmitError> for ApiError {
    fn from(e: SubmitError) -> Self {
        ApiError::Submit(e)
    }
}

/// Build the application router
pub fn router(runner: Runner) -> Router {
    let artifacts = runner.publisher().router::<()>();

    Router::new()
        .route("/run-script", post(run_script))
        .route("/health", get(health))
        .with_state(runner)
        .merge(artifacts)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn run_script(
    State(runner): State<Runner>,
    payload: Result<Json<SubmissionRequest>, JsonRejection>,
) -> Result<Json<RunScriptResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::MalformedBody(e.body_text()))?;

    info!(
        language = request.source_language.as_deref().unwrap_or(""),
        library = request.library_hint.as_deref().unwrap_or(""),
        kind = request.visualization_kind.as_deref().unwrap_or(""),
        "received run-script request"
    );

    let outcome = runner.submit_request(request).await?;
    let result = outcome.result;

    match (result.status, result.artifact_url) {
        (ExecutionStatus::Succeeded, Some(file_url)) => Ok(Json(RunScriptResponse {
            message: SUCCESS_MESSAGE.to_owned(),
            file_url,
        })),
        (ExecutionStatus::Succeeded, None) => Err(ApiError::Execution {
            status: ExecutionStatus::Failed,
            details: Some(format!(
                "artifact path {} has no publishable file name",
                outcome.artifact_path.display()
            )),
        }),
        (status, _) => Err(ApiError::Execution {
            status,
            details: result.diagnostics,
        }),
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Periodically delete artifacts older than `max_age`
pub fn spawn_retention_sweep(
    workspace: Workspace,
    max_age: Duration,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            match workspace.sweep_outputs(max_age).await {
                Ok(0) => debug!("retention sweep removed nothing"),
                Ok(removed) => info!(removed, "retention sweep removed artifacts"),
                Err(e) => warn!(error = %e, "retention sweep failed"),
            }
        }
    })
}

/// Serve the application on `listener` until ctrl-c
///
/// Starts the retention sweep when the configuration enables it.
pub async fn serve(runner: Runner, listener: TcpListener) -> std::io::Result<()> {
    let sweeper = runner.config().retention_duration().map(|max_age| {
        info!(?max_age, "artifact retention enabled");
        spawn_retention_sweep(
            runner.workspace().clone(),
            max_age,
            runner.config().sweep_period(),
        )
    });

    info!(addr = ?listener.local_addr()?, "server listening");
    let served = axum::serve(listener, router(runner))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
