use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use serde_json::{Value, json};
use tower::ServiceExt;
use vizexec::server::{SUCCESS_MESSAGE, router};

use super::{entries, sh_config, test_runner};

async fn post_json(app: axum::Router, body: Value) -> Response {
    app.oneshot(
        Request::post("/run-script")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_run_script_success_returns_file_url() {
    let (_dir, runner) = test_runner(sh_config(Some(10.0))).await;
    let app = router(runner.clone());

    let response = post_json(
        app.clone(),
        json!({
            "language": "python",
            "library": "matplotlib",
            "vizType": "static",
            "code": "printf 'PNGDATA' > \"$1\"\n",
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["message"], SUCCESS_MESSAGE);
    let url = body["fileUrl"].as_str().unwrap();
    assert!(url.starts_with("http://localhost:3001/visuals/plot_"));
    assert!(url.ends_with(".png"));

    // The published URL resolves through the same router
    let path = url.trim_start_matches("http://localhost:3001");
    let response = app
        .oneshot(Request::get(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"PNGDATA");
}

#[tokio::test]
async fn test_run_script_accepts_long_field_names() {
    let (_dir, runner) = test_runner(sh_config(Some(10.0))).await;

    let response = post_json(
        router(runner),
        json!({
            "sourceLanguage": "r",
            "visualizationKind": "3d",
            "code": "printf '<html></html>' > \"$1\"\n",
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["fileUrl"].as_str().unwrap().ends_with(".html"));
}

#[tokio::test]
async fn test_run_script_missing_fields_is_bad_request() {
    let (_dir, runner) = test_runner(sh_config(Some(10.0))).await;

    let response = post_json(
        router(runner.clone()),
        json!({ "language": "python", "library": "matplotlib" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("Missing required fields"));
    assert!(error.contains("visualizationKind"));
    assert!(error.contains("code"));
    assert!(entries(runner.workspace().scripts_dir()).is_empty());
}

#[tokio::test]
async fn test_run_script_unsupported_language_is_bad_request() {
    let (_dir, runner) = test_runner(sh_config(Some(10.0))).await;

    let response = post_json(
        router(runner.clone()),
        json!({
            "language": "julia",
            "library": "Plots",
            "vizType": "static",
            "code": "plot(1:10)",
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Unsupported language: julia");
    assert!(entries(runner.workspace().scripts_dir()).is_empty());
    assert!(entries(runner.workspace().outputs_dir()).is_empty());
}

#[tokio::test]
async fn test_run_script_failure_carries_details() {
    let (_dir, runner) = test_runner(sh_config(Some(10.0))).await;

    let response = post_json(
        router(runner),
        json!({
            "language": "python",
            "library": "seaborn",
            "vizType": "static",
            "code": "echo 'NameError: name sns is not defined' >&2\nexit 1\n",
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Execution failed");
    assert!(body["details"].as_str().unwrap().contains("NameError"));
}

#[tokio::test]
async fn test_run_script_timeout_is_gateway_timeout() {
    let (_dir, runner) = test_runner(sh_config(Some(0.3))).await;

    let response = post_json(
        router(runner),
        json!({
            "language": "python",
            "library": "matplotlib",
            "vizType": "static",
            "code": "exec sleep 30\n",
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Execution timed out");
}

#[tokio::test]
async fn test_run_script_malformed_body_is_bad_request() {
    let (_dir, runner) = test_runner(sh_config(Some(10.0))).await;

    let response = router(runner)
        .oneshot(
            Request::post("/run-script")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Malformed request body");
}

#[tokio::test]
async fn test_health() {
    let (_dir, runner) = test_runner(sh_config(Some(10.0))).await;

    let response = router(runner)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
}
