//! Shared domain types.

use serde::{Deserialize, Serialize};

/// Opaque job identifier handed out on upload.
pub type JobId = uuid::Uuid;

// ---------------------------------------------------------------------------
// Hazard state
// ---------------------------------------------------------------------------

/// Discrete escalation state, recomputed fresh on every tick.
///
/// Transitions are level-triggered: the state follows the current smoothed
/// scores in either direction and is never latched. A score hovering on a
/// threshold will flap between the two adjacent states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HazardState {
    Normal,
    PreFire,
    SmokeDetected,
    FireGrowing,
    #[serde(rename = "CALL_119")]
    Call119,
}

impl Default for HazardState {
    fn default() -> Self {
        HazardState::Normal
    }
}

// ---------------------------------------------------------------------------
// Detections
// ---------------------------------------------------------------------------

/// Detection class of a bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionClass {
    Fire,
    Smoke,
}

/// Axis-aligned box in source-frame pixel coordinates.
///
/// Invariant: `x1 <= x2`, `y1 <= y2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// One detected region on a processed frame, as returned by the detection
/// engine. Transient — owned by the tick event it ends up in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(flatten)]
    pub bbox: BoundingBox,
    pub cls: DetectionClass,
    pub conf: f64,
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

/// Smoothed scores carried on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub fire: f64,
    pub smoke: f64,
    pub hazard: f64,
}

/// Per-frame raw (unsmoothed) maxima, before the EMA.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawScores {
    pub fire: f64,
    pub smoke: f64,
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// A decoded video frame (rgb24, row-major).
#[derive(Clone)]
pub struct Frame {
    /// Zero-based index in the source video.
    pub index: u64,
    pub width: u32,
    pub height: u32,
    /// `width * height * 3` bytes.
    pub data: Vec<u8>,
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Omit the pixel buffer.
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Video metadata read once when a source is opened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoMeta {
    /// Native frame rate of the source.
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    /// Total frame count, or 0 when the container does not report one.
    pub frame_count: u64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
