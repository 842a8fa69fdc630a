use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pyrowatch_api::config::ServerConfig;
use pyrowatch_api::{routes, state};
use pyrowatch_core::rules::Rules;
use pyrowatch_detector::adapter::Detector;
use pyrowatch_detector::HttpDetector;
use pyrowatch_events::delivery::{AlertMailer, EmailConfig};
use pyrowatch_pipeline::registry::JobRegistry;
use pyrowatch_pipeline::sweep::start_sweeper;

use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pyrowatch_api=debug,pyrowatch_pipeline=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let rules = Rules::default();
    rules.validate().expect("Default rules must validate");

    // --- Media directories ---
    tokio::fs::create_dir_all(config.uploads_dir())
        .await
        .expect("Failed to create upload directory");
    tracing::info!(dir = %config.uploads_dir().display(), "Upload directory ready");

    // --- CORS ---
    let cors = build_cors_layer(&config);

    // --- Job registry ---
    let registry = Arc::new(JobRegistry::new(Duration::from_secs(config.job_ttl_secs)));

    // --- Registry sweeper ---
    let sweeper_cancel = tokio_util::sync::CancellationToken::new();
    let sweeper_handle = start_sweeper(
        Arc::clone(&registry),
        Duration::from_secs(config.sweep_interval_secs),
        sweeper_cancel.clone(),
    );
    tracing::info!(ttl_secs = config.job_ttl_secs, "Job sweeper started");

    // --- Detection engine adapter ---
    let detector: Arc<dyn Detector> = Arc::new(HttpDetector::new(
        config.detector_url.clone(),
        rules.inference,
    ));
    tracing::info!(url = %config.detector_url, "Detector adapter configured");

    // --- Emergency alert mailer ---
    let mailer = EmailConfig::from_env().map(|cfg| Arc::new(AlertMailer::new(cfg)));
    if mailer.is_some() {
        tracing::info!("Emergency alert mailer configured");
    } else {
        tracing::info!("SMTP not configured, emergency alerts disabled");
    }

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        registry: Arc::clone(&registry),
        detector,
        rules,
        mailer,
    };

    // --- Request ID header name ---
    let request_id_header = HeaderName::from_static("x-request-id");

    // --- Router ---
    let app = Router::new()
        // Health check at root level (not under /api/v1).
        .merge(routes::health::router())
        // API v1 routes.
        .nest("/api/v1", routes::api_routes())
        // Request timeout for the routes above. The SSE stream below is
        // long-lived and mounted outside this layer.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .nest("/api/v1", routes::stream::router())
        // Stored originals for client playback.
        .nest_service("/media", ServeDir::new(&config.media_dir))
        // -- Middleware stack (applied bottom-up) --
        // Panic recovery: catch panics and return 500 JSON.
        .layer(CatchPanicLayer::new())
        // Propagate request ID to response.
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        // Structured request/response tracing.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Set request ID on incoming requests.
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        // CORS.
        .layer(cors)
        // Shared state.
        .with_state(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Job loops are cooperative; dropping the process ends them. Stop the
    // sweeper cleanly so its final sweep is not interrupted mid-write.
    sweeper_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), sweeper_handle).await;
    tracing::info!("Job sweeper stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Build the CORS middleware layer from server configuration.
///
/// Panics at startup if any configured origin is invalid, which is the
/// desired behaviour -- we want misconfiguration to fail fast.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
