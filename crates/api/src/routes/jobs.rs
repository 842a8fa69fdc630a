//! Route definitions and handlers for the `/jobs` resource.
//!
//! ```text
//! POST   /                 -> upload_job
//! GET    /{id}             -> job_status
//! POST   /{id}/control     -> control_job
//! POST   /{id}/restart     -> restart_job
//! ```
//!
//! The event stream (`GET /{id}/events`) lives in
//! [`crate::routes::stream`] so it can be mounted outside the request
//! timeout.

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use pyrowatch_core::error::CoreError;
use pyrowatch_core::types::JobId;
use pyrowatch_pipeline::registry::{ControlCommand, FlagsView, JobStatus};
use pyrowatch_pipeline::runner::run_job;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(upload_job))
        .route("/{id}", get(job_status))
        .route("/{id}/control", post(control_job))
        .route("/{id}/restart", post(restart_job))
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// Response payload for a successful upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub job_id: JobId,
    /// Where the client can play the stored original back from.
    pub video_url: String,
}

/// POST /jobs -- multipart video upload; registers the job and spawns
/// its processing loop.
async fn upload_job(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<UploadResponse>>)> {
    let mut stored: Option<(JobId, std::path::PathBuf)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let is_video = field
            .content_type()
            .is_some_and(|ct| ct.starts_with("video/"));
        if !is_video {
            return Err(AppError::BadRequest("Video file required".to_string()));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("upload read failed: {e}")))?;
        if data.is_empty() {
            return Err(AppError::BadRequest("uploaded file is empty".to_string()));
        }

        let job_id = JobId::new_v4();
        let uploads = state.config.uploads_dir();
        tokio::fs::create_dir_all(&uploads)
            .await
            .map_err(|e| AppError::InternalError(format!("cannot create upload dir: {e}")))?;

        let dest = uploads.join(format!("{job_id}.mp4"));
        tokio::fs::write(&dest, &data)
            .await
            .map_err(|e| AppError::InternalError(format!("cannot store upload: {e}")))?;

        tracing::info!(%job_id, bytes = data.len(), "Video stored");
        stored = Some((job_id, dest));
        break;
    }

    let Some((job_id, dest)) = stored else {
        return Err(AppError::BadRequest(
            "missing \"file\" multipart field".to_string(),
        ));
    };

    let ctx = state.registry.register(job_id, dest).await;
    tokio::spawn(run_job(
        Arc::clone(&state.registry),
        Arc::clone(&state.detector),
        state.rules,
        ctx,
    ));

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: UploadResponse {
                job_id,
                video_url: format!("/media/uploads/{job_id}.mp4"),
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// GET /jobs/{id} -- lifecycle record of a job.
async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<Json<DataResponse<JobStatus>>> {
    let status = state.registry.status(job_id).await?;
    Ok(Json(DataResponse { data: status }))
}

// ---------------------------------------------------------------------------
// Control
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ControlRequest {
    /// `pause` | `resume` | `stop`.
    pub cmd: String,
}

#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub job_id: JobId,
    pub flags: FlagsView,
}

/// POST /jobs/{id}/control -- pause/resume/stop the running analysis.
///
/// Unknown commands are rejected synchronously; the job is untouched.
async fn control_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
    Json(request): Json<ControlRequest>,
) -> AppResult<Json<DataResponse<ControlResponse>>> {
    let cmd = ControlCommand::parse(&request.cmd)
        .ok_or_else(|| AppError::BadRequest("cmd must be pause|resume|stop".to_string()))?;

    let flags = state.registry.control(job_id, cmd).await?;
    Ok(Json(DataResponse {
        data: ControlResponse { job_id, flags },
    }))
}

// ---------------------------------------------------------------------------
// Restart
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct RestartResponse {
    pub job_id: JobId,
    pub restarted: bool,
}

/// POST /jobs/{id}/restart -- re-analyze the stored video from frame 0.
///
/// Stops the previous loop (if still running), installs a fresh event
/// channel and flags, and spawns a new run.
async fn restart_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<Json<DataResponse<RestartResponse>>> {
    let path = state.registry.video_path(job_id).await?;
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "video file",
            id: path.display().to_string(),
        }));
    }

    let ctx = state.registry.restart(job_id).await?;
    tokio::spawn(run_job(
        Arc::clone(&state.registry),
        Arc::clone(&state.detector),
        state.rules,
        ctx,
    ));

    Ok(Json(DataResponse {
        data: RestartResponse {
            job_id,
            restarted: true,
        },
    }))
}
