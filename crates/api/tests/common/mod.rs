use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use pyrowatch_api::config::ServerConfig;
use pyrowatch_api::routes;
use pyrowatch_api::state::AppState;
use pyrowatch_core::rules::Rules;
use pyrowatch_detector::adapter::Detector;
use pyrowatch_detector::ScriptedDetector;
use pyrowatch_pipeline::registry::JobRegistry;

/// Everything a test needs to drive the app.
pub struct TestApp {
    pub router: Router,
    pub registry: Arc<JobRegistry>,
    /// Owns the media directory for the test's lifetime.
    pub media: tempfile::TempDir,
}

/// Build a test `ServerConfig` with safe defaults and an isolated media
/// directory.
pub fn test_config(media_dir: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        media_dir: media_dir.to_path_buf(),
        detector_url: "http://127.0.0.1:8600".to_string(),
        job_ttl_secs: 3600,
        sweep_interval_secs: 60,
    }
}

/// Build the full application router with all middleware layers.
///
/// This mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack (CORS, request ID, timeout, tracing,
/// panic recovery) that production uses. The detector is scripted to see
/// nothing; no SMTP mailer is configured.
pub fn build_test_app() -> TestApp {
    let media = tempfile::tempdir().expect("tempdir");
    let config = test_config(media.path());
    let registry = Arc::new(JobRegistry::new(Duration::from_secs(config.job_ttl_secs)));
    let detector: Arc<dyn Detector> = Arc::new(ScriptedDetector::empty());

    let state = AppState {
        config: Arc::new(config.clone()),
        registry: Arc::clone(&registry),
        detector,
        rules: Rules::default(),
        mailer: None,
    };

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    let router = Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .nest("/api/v1", routes::stream::router())
        .nest_service("/media", ServeDir::new(&config.media_dir))
        .layer(CatchPanicLayer::new())
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state);

    TestApp {
        router,
        registry,
        media,
    }
}

/// Issue a GET request against the app.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request"),
    )
    .await
    .expect("response")
}

/// Issue a POST request with a JSON body.
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
    )
    .await
    .expect("response")
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("valid JSON body")
}

/// Collect a response body as text (for SSE payloads).
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}
