use std::sync::Arc;

use pyrowatch_core::rules::Rules;
use pyrowatch_detector::adapter::Detector;
use pyrowatch_events::delivery::AlertMailer;
use pyrowatch_pipeline::registry::JobRegistry;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc` or is `Copy`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Process-wide job registry.
    pub registry: Arc<JobRegistry>,
    /// Detection-engine adapter shared by every job loop.
    pub detector: Arc<dyn Detector>,
    /// Detection rules applied to new runs.
    pub rules: Rules,
    /// Emergency alert mailer; `None` when SMTP is not configured.
    pub mailer: Option<Arc<AlertMailer>>,
}
