//! Route modules and the `/api/v1` router.

pub mod alerts;
pub mod health;
pub mod jobs;
pub mod stream;

use axum::Router;

use crate::state::AppState;

/// Routes mounted under `/api/v1` that run behind the request timeout.
///
/// The event stream router ([`stream::router`]) is mounted separately —
/// it is long-lived by design and must not be cut off by the timeout
/// layer.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/jobs", jobs::router())
        .nest("/alerts", alerts::router())
}
