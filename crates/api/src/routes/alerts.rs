//! Emergency alert endpoint.
//!
//! Triggered by a human action on the client (the call-119 button), not
//! by the state machine. Delivery is a fire-and-forget side effect; the
//! handler only reports whether the SMTP hand-off succeeded.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use pyrowatch_core::types::{JobId, Scores};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/emergency", post(send_emergency))
}

#[derive(Debug, Deserialize)]
pub struct EmergencyRequest {
    pub job_id: JobId,
    /// Scores shown to the operator at the moment of the alert.
    pub scores: Scores,
    /// Video-relative timestamp, if the client knows it.
    pub timestamp: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct EmergencyResponse {
    pub sent: bool,
}

/// POST /alerts/emergency -- send the emergency e-mail.
async fn send_emergency(
    State(state): State<AppState>,
    Json(request): Json<EmergencyRequest>,
) -> AppResult<Json<DataResponse<EmergencyResponse>>> {
    let Some(mailer) = &state.mailer else {
        return Err(AppError::InternalError(
            "email delivery is not configured".to_string(),
        ));
    };

    tracing::warn!(job_id = %request.job_id, "Emergency alert requested");

    mailer
        .send_emergency(request.job_id, &request.scores, request.timestamp)
        .await
        .map_err(|e| AppError::InternalError(format!("email delivery failed: {e}")))?;

    Ok(Json(DataResponse {
        data: EmergencyResponse { sent: true },
    }))
}
