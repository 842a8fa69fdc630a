//! Integration tests for the SSE event stream.

mod common;

use axum::http::StatusCode;
use http_body_util::BodyExt;

use common::{body_text, get};
use pyrowatch_core::types::JobId;
use pyrowatch_events::event::StreamEvent;

/// Split an SSE body into its `data:` payloads.
fn sse_payloads(body: &str) -> Vec<serde_json::Value> {
    body.split("\n\n")
        .filter_map(|chunk| chunk.strip_prefix("data: "))
        .map(|payload| serde_json::from_str(payload.trim()).expect("SSE payload is JSON"))
        .collect()
}

#[tokio::test]
async fn stream_for_unknown_job_returns_404() {
    let app = common::build_test_app();
    let response = get(
        app.router,
        &format!("/api/v1/jobs/{}/events", JobId::new_v4()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stream_greets_then_forwards_until_terminal() {
    let app = common::build_test_app();
    let job_id = JobId::new_v4();
    let ctx = app
        .registry
        .register(job_id, app.media.path().join("a.mp4"))
        .await;

    // Producer finishes before the subscriber attaches: the queue holds
    // the terminal event until it is drained.
    ctx.sender
        .send(StreamEvent::End { job_id })
        .await
        .unwrap();

    let response = get(app.router, &format!("/api/v1/jobs/{job_id}/events")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/event-stream"
    );

    // The body terminates after the `end` event, so collecting it is
    // finite.
    let body = body_text(response).await;
    let payloads = sse_payloads(&body);

    assert_eq!(payloads.len(), 2);
    assert_eq!(payloads[0]["type"], "hello");
    assert_eq!(payloads[0]["job_id"], job_id.to_string());
    assert_eq!(payloads[1]["type"], "end");
}

#[tokio::test]
async fn second_subscriber_conflicts() {
    let app = common::build_test_app();
    let job_id = JobId::new_v4();
    let ctx = app
        .registry
        .register(job_id, app.media.path().join("a.mp4"))
        .await;
    ctx.sender.send(StreamEvent::End { job_id }).await.unwrap();

    let first = get(
        app.router.clone(),
        &format!("/api/v1/jobs/{job_id}/events"),
    )
    .await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = get(app.router, &format!("/api/v1/jobs/{job_id}/events")).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test(start_paused = true)]
async fn idle_stream_emits_heartbeats() {
    let app = common::build_test_app();
    let job_id = JobId::new_v4();
    let ctx = app
        .registry
        .register(job_id, app.media.path().join("a.mp4"))
        .await;

    let response = get(app.router, &format!("/api/v1/jobs/{job_id}/events")).await;
    let mut body = response.into_body();

    // First frame is the greeting.
    let frame = body.frame().await.unwrap().unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.contains("\"type\":\"hello\""), "got: {text}");

    // No producer activity: the idle window elapses (virtually) and a
    // synthetic heartbeat arrives without consuming anything.
    let frame = body.frame().await.unwrap().unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.contains("\"type\":\"heartbeat\""), "got: {text}");

    // A real event still comes through afterwards, and terminates the
    // stream.
    ctx.sender.send(StreamEvent::End { job_id }).await.unwrap();
    let frame = body.frame().await.unwrap().unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.contains("\"type\":\"end\""), "got: {text}");

    assert!(body.frame().await.is_none(), "stream must end after `end`");
}

#[tokio::test]
async fn error_event_terminates_stream() {
    let app = common::build_test_app();
    let job_id = JobId::new_v4();
    let ctx = app
        .registry
        .register(job_id, app.media.path().join("a.mp4"))
        .await;

    ctx.sender
        .send(StreamEvent::Error {
            job_id,
            error: "cannot open video".to_string(),
        })
        .await
        .unwrap();

    let response = get(app.router, &format!("/api/v1/jobs/{job_id}/events")).await;
    let body = body_text(response).await;
    let payloads = sse_payloads(&body);

    assert_eq!(payloads.len(), 2);
    assert_eq!(payloads[1]["type"], "error");
    assert_eq!(payloads[1]["error"], "cannot open video");
}
