//! Sampling and pacing arithmetic.
//!
//! Pure helpers used by the job runner to decide which frames reach the
//! detector and how far behind wall clock the loop has fallen. The runner
//! owns the actual clock; everything here is arithmetic on counts and
//! durations.

use std::time::Duration;

/// Number of source frames advanced between consecutive detector calls.
///
/// `max(1, round(source_fps / target_fps))` — a source slower than the
/// target still samples every frame.
pub fn sampling_stride(source_fps: f64, target_fps: f64) -> u64 {
    let ratio = source_fps / target_fps;
    (ratio.round() as i64).max(1) as u64
}

/// Video-relative timestamp of a frame.
pub fn video_time(frame_index: u64, source_fps: f64) -> Duration {
    Duration::from_secs_f64(frame_index as f64 / source_fps)
}

/// How many frames to skip (without decoding for inference) to win back a
/// wall-clock lag.
///
/// `floor(lag / frame_interval)`; zero when the lag is under one frame
/// interval.
pub fn lag_frames(lag: Duration, source_fps: f64) -> u64 {
    let interval = 1.0 / source_fps;
    (lag.as_secs_f64() / interval) as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
