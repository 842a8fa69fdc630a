//! The per-job processing loop.
//!
//! One spawned task per run: reads frames in order, sends every stride-th
//! one to the detector, folds the confidences through the hazard engine,
//! emits a tick per processed frame, and paces emission against wall
//! clock so the stream tracks the video's own timeline. Cancellation is
//! cooperative — `stop` is observed at the top of each iteration, and a
//! pause is a 50 ms poll that keeps watching the same flag.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use pyrowatch_core::hazard::HazardEngine;
use pyrowatch_core::pacing::{lag_frames, sampling_stride, video_time};
use pyrowatch_core::rules::Rules;
use pyrowatch_core::types::{Detection, DetectionClass, RawScores, Scores};
use pyrowatch_detector::adapter::{Detector, DetectorError};
use pyrowatch_events::event::StreamEvent;

use crate::registry::{JobContext, JobRegistry, RunOutcome};
use crate::source::{FfmpegSource, SourceError, VideoSource};

/// Sleep-and-recheck interval while paused.
const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Why the loop stopped early.
#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Detector(#[from] DetectorError),

    /// The consumer side of the event channel is gone — the run was
    /// superseded by a restart or its stream was abandoned. Not a job
    /// failure.
    #[error("event channel closed")]
    ChannelClosed,
}

/// Open the stored video and run the job to completion.
///
/// This is the entry point spawned per run; it never surfaces an error —
/// every fatal condition becomes a terminal `error` event and an
/// annotated job record.
pub async fn run_job(
    registry: Arc<JobRegistry>,
    detector: Arc<dyn Detector>,
    rules: Rules,
    ctx: JobContext,
) {
    match FfmpegSource::open(ctx.video_path.clone()).await {
        Ok(source) => {
            run_with_source(registry, detector, rules, ctx, Box::new(source)).await;
        }
        Err(e) => {
            let message = format!("cannot open video: {e}");
            finish(&registry, &ctx, RunOutcome::Failed(message)).await;
        }
    }
}

/// Run the loop against an already-open source. Split out so tests can
/// drive a synthetic source through the real loop.
pub async fn run_with_source(
    registry: Arc<JobRegistry>,
    detector: Arc<dyn Detector>,
    rules: Rules,
    ctx: JobContext,
    mut source: Box<dyn VideoSource>,
) {
    let outcome = match drive(detector.as_ref(), &rules, &ctx, source.as_mut()).await {
        Ok(()) => RunOutcome::Completed,
        Err(RunError::ChannelClosed) => {
            // Nobody can observe this run anymore; wind down quietly.
            tracing::debug!(job_id = %ctx.job_id, "Event channel closed, abandoning run");
            RunOutcome::Completed
        }
        Err(e) => RunOutcome::Failed(e.to_string()),
    };
    finish(&registry, &ctx, outcome).await;
}

/// Emit the terminal event, record the outcome (epoch-guarded), and raise
/// the run's finished signal.
async fn finish(registry: &JobRegistry, ctx: &JobContext, outcome: RunOutcome) {
    let terminal = match &outcome {
        RunOutcome::Completed => StreamEvent::End { job_id: ctx.job_id },
        RunOutcome::Failed(message) => StreamEvent::Error {
            job_id: ctx.job_id,
            error: message.clone(),
        },
    };
    // A closed channel here is the stale-restart race; the epoch guard in
    // the registry handles the record side.
    let _ = ctx.sender.send(terminal).await;

    registry.finish(ctx.job_id, ctx.epoch, outcome).await;
    ctx.finished.store(true, Ordering::SeqCst);
}

/// The loop proper.
async fn drive(
    detector: &dyn Detector,
    rules: &Rules,
    ctx: &JobContext,
    source: &mut dyn VideoSource,
) -> Result<(), RunError> {
    let meta = *source.meta();
    let stride = sampling_stride(meta.fps, rules.target_fps);
    let mut engine = HazardEngine::new(rules);

    tracing::info!(
        job_id = %ctx.job_id,
        fps = meta.fps,
        width = meta.width,
        height = meta.height,
        stride,
        "Processing started"
    );

    // Wall-clock instant corresponding to video time 0. Shifted forward
    // by the length of every pause so `due` stays aligned with the
    // video's own timeline.
    let mut start_wall = Instant::now();
    let mut pause_started: Option<Instant> = None;
    let mut last_state = engine.state();
    let mut processed: u64 = 0;

    loop {
        if ctx.flags.stop_requested() {
            tracing::info!(job_id = %ctx.job_id, "Stop requested, exiting loop");
            break;
        }

        if ctx.flags.is_paused() {
            if pause_started.is_none() {
                pause_started = Some(Instant::now());
            }
            tokio::time::sleep(PAUSE_POLL_INTERVAL).await;
            continue;
        }
        if let Some(paused_at) = pause_started.take() {
            start_wall += paused_at.elapsed();
        }

        let Some(frame) = source.next_frame().await? else {
            break;
        };

        if frame.index % stride != 0 {
            continue;
        }
        processed += 1;

        let boxes = detector.detect(&frame).await?;
        let raw = raw_maxima(&boxes);
        let update = engine.update(raw.fire, raw.smoke);

        if update.state != last_state {
            tracing::info!(
                job_id = %ctx.job_id,
                from = ?last_state,
                to = ?update.state,
                fire = update.fire_ema,
                smoke = update.smoke_ema,
                hazard = update.hazard,
                "Hazard state changed"
            );
            last_state = update.state;
        }

        let t = video_time(frame.index, meta.fps);
        let tick = StreamEvent::tick(
            ctx.job_id,
            t.as_secs_f64(),
            update.state,
            Scores {
                fire: update.fire_ema,
                smoke: update.smoke_ema,
                hazard: update.hazard,
            },
            raw,
            meta.width,
            meta.height,
            boxes,
        );
        ctx.sender
            .send(tick)
            .await
            .map_err(|_| RunError::ChannelClosed)?;

        // Pace against wall clock: sleep when ahead, skip undecoded
        // frames when behind.
        let due = start_wall + t;
        let now = Instant::now();
        if due > now {
            tokio::time::sleep_until(due).await;
        } else {
            let behind = lag_frames(now - due, meta.fps);
            for _ in 0..behind {
                if !source.skip_frame().await? {
                    break;
                }
            }
        }
    }

    tracing::info!(job_id = %ctx.job_id, processed, "Processing finished");
    Ok(())
}

/// Per-frame raw confidences: the maximum over each class, 0.0 when the
/// class was not detected at all.
fn raw_maxima(boxes: &[Detection]) -> RawScores {
    let mut raw = RawScores {
        fire: 0.0,
        smoke: 0.0,
    };
    for b in boxes {
        match b.cls {
            DetectionClass::Fire => raw.fire = raw.fire.max(b.conf),
            DetectionClass::Smoke => raw.smoke = raw.smoke.max(b.conf),
        }
    }
    raw
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
