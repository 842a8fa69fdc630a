//! Integration tests for upload, status, control, and restart.

mod common;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use common::{body_json, get, post_json};
use pyrowatch_core::types::JobId;
use pyrowatch_pipeline::registry::RunOutcome;

// ---------------------------------------------------------------------------
// Control semantics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn control_unknown_job_returns_404() {
    let app = common::build_test_app();
    let response = post_json(
        app.router,
        &format!("/api/v1/jobs/{}/control", JobId::new_v4()),
        json!({"cmd": "pause"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn control_with_unknown_command_returns_400() {
    let app = common::build_test_app();
    let job_id = JobId::new_v4();
    let _ctx = app
        .registry
        .register(job_id, app.media.path().join("a.mp4"))
        .await;

    let response = post_json(
        app.router,
        &format!("/api/v1/jobs/{job_id}/control"),
        json!({"cmd": "rewind"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "cmd must be pause|resume|stop");
}

#[tokio::test]
async fn pause_and_resume_round_trip() {
    let app = common::build_test_app();
    let job_id = JobId::new_v4();
    let ctx = app
        .registry
        .register(job_id, app.media.path().join("a.mp4"))
        .await;

    let response = post_json(
        app.router.clone(),
        &format!("/api/v1/jobs/{job_id}/control"),
        json!({"cmd": "pause"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["flags"]["paused"], true);
    assert!(ctx.flags.is_paused());

    let response = post_json(
        app.router,
        &format!("/api/v1/jobs/{job_id}/control"),
        json!({"cmd": "resume"}),
    )
    .await;
    let body = body_json(response).await;
    assert_eq!(body["data"]["flags"]["paused"], false);
    assert!(!ctx.flags.is_paused());
}

#[tokio::test]
async fn control_after_completion_returns_404() {
    let app = common::build_test_app();
    let job_id = JobId::new_v4();
    let ctx = app
        .registry
        .register(job_id, app.media.path().join("a.mp4"))
        .await;
    app.registry
        .finish(job_id, ctx.epoch, RunOutcome::Completed)
        .await;

    let response = post_json(
        app.router,
        &format!("/api/v1/jobs/{job_id}/control"),
        json!({"cmd": "stop"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_reports_lifecycle_record() {
    let app = common::build_test_app();
    let job_id = JobId::new_v4();
    let ctx = app
        .registry
        .register(job_id, app.media.path().join("a.mp4"))
        .await;

    let response = get(app.router.clone(), &format!("/api/v1/jobs/{job_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["job_id"], job_id.to_string());
    assert_eq!(body["data"]["done"], false);
    assert_eq!(body["data"]["error"], serde_json::Value::Null);

    app.registry
        .finish(job_id, ctx.epoch, RunOutcome::Failed("detector gone".into()))
        .await;

    let response = get(app.router, &format!("/api/v1/jobs/{job_id}")).await;
    let body = body_json(response).await;
    assert_eq!(body["data"]["done"], false);
    assert_eq!(body["data"]["error"], "detector gone");
}

// ---------------------------------------------------------------------------
// Restart
// ---------------------------------------------------------------------------

#[tokio::test]
async fn restart_unknown_job_returns_404() {
    let app = common::build_test_app();
    let response = post_json(
        app.router,
        &format!("/api/v1/jobs/{}/restart", JobId::new_v4()),
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn restart_with_missing_video_file_returns_404() {
    let app = common::build_test_app();
    let job_id = JobId::new_v4();
    // Registered, but the file was never stored.
    let _ctx = app
        .registry
        .register(job_id, app.media.path().join("gone.mp4"))
        .await;

    let response = post_json(
        app.router,
        &format!("/api/v1/jobs/{job_id}/restart"),
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

const BOUNDARY: &str = "pyrowatch-test-boundary";

fn multipart_request(uri: &str, content_type: &str, payload: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"clip.mp4\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request")
}

#[tokio::test]
async fn upload_stores_video_and_registers_job() {
    let app = common::build_test_app();

    let request = multipart_request("/api/v1/jobs", "video/mp4", b"not-really-mpeg-data");
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;

    let job_id: JobId = body["data"]["job_id"]
        .as_str()
        .expect("job_id string")
        .parse()
        .expect("job_id is a uuid");
    assert_eq!(
        body["data"]["video_url"],
        format!("/media/uploads/{job_id}.mp4")
    );

    // The original landed on disk under the job's name.
    let stored = app.media.path().join("uploads").join(format!("{job_id}.mp4"));
    assert!(stored.exists(), "uploaded file not stored at {stored:?}");

    // And the job is known to the registry.
    let response = get(app.router, &format!("/api/v1/jobs/{job_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn upload_rejects_non_video_content() {
    let app = common::build_test_app();

    let request = multipart_request("/api/v1/jobs", "text/plain", b"hello");
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Video file required");
}

#[tokio::test]
async fn upload_without_file_field_is_rejected() {
    let app = common::build_test_app();

    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"comment\"\r\n\r\nhi\r\n--{BOUNDARY}--\r\n"
    );
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/jobs")
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request");

    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
