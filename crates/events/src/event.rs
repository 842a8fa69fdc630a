//! The server→client event envelope.
//!
//! One event per SSE payload, JSON with a required `type` tag. `end` and
//! `error` are terminal: the stream adapter closes the stream after
//! forwarding one.

use serde::{Deserialize, Serialize};

use pyrowatch_core::types::{Detection, HazardState, JobId, RawScores, Scores};

/// Payload of one processed frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickEvent {
    pub job_id: JobId,
    /// Video-relative timestamp in seconds.
    pub t: f64,
    pub state: HazardState,
    pub scores: Scores,
    pub raw_scores: RawScores,
    /// Source frame resolution, for scaling boxes on the client.
    pub img_w: u32,
    pub img_h: u32,
    pub boxes: Vec<Detection>,
}

/// Everything that can appear on a job's event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Emitted once when a subscriber attaches.
    Hello { job_id: JobId },
    /// Synthetic keep-alive after an idle window with no real event.
    Heartbeat { job_id: JobId },
    /// One detector-processed frame.
    Tick(TickEvent),
    /// Terminal, success (end of stream or explicit stop).
    End { job_id: JobId },
    /// Terminal, failure.
    Error { job_id: JobId, error: String },
}

impl StreamEvent {
    /// Build a tick with scores rounded the way the wire expects
    /// (3 decimals).
    #[allow(clippy::too_many_arguments)]
    pub fn tick(
        job_id: JobId,
        t: f64,
        state: HazardState,
        scores: Scores,
        raw_scores: RawScores,
        img_w: u32,
        img_h: u32,
        boxes: Vec<Detection>,
    ) -> Self {
        StreamEvent::Tick(TickEvent {
            job_id,
            t,
            state,
            scores: Scores {
                fire: round3(scores.fire),
                smoke: round3(scores.smoke),
                hazard: round3(scores.hazard),
            },
            raw_scores: RawScores {
                fire: round3(raw_scores.fire),
                smoke: round3(raw_scores.smoke),
            },
            img_w,
            img_h,
            boxes,
        })
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::End { .. } | StreamEvent::Error { .. })
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
