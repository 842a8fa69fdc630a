//! Pyrowatch domain logic.
//!
//! Pure types and functions shared by the pipeline, detector adapter, and
//! HTTP layer. Nothing in this crate performs I/O or keeps time — the
//! hazard engine and pacing arithmetic are deterministic so they can be
//! unit-tested without a clock or a video file.

pub mod error;
pub mod hazard;
pub mod pacing;
pub mod rules;
pub mod types;

pub use error::CoreError;
pub use hazard::{HazardEngine, HazardUpdate};
pub use rules::Rules;
pub use types::{
    BoundingBox, Detection, DetectionClass, Frame, HazardState, JobId, RawScores, Scores,
    VideoMeta,
};
