//! Pyrowatch processing pipeline.
//!
//! Everything between an uploaded file and the event stream:
//!
//! - [`JobRegistry`] — the injected, lock-guarded map of job records,
//!   control flags, epochs, and event channels.
//! - [`source`] — the video-source seam: an ffmpeg/ffprobe implementation
//!   and a synthetic one for tests.
//! - [`runner`] — the per-job loop: sampling, detection, smoothing,
//!   wall-clock pacing, terminal events.
//! - [`sweep`] — background eviction of expired finished jobs.

pub mod registry;
pub mod runner;
pub mod source;
pub mod sweep;

pub use registry::{ControlCommand, FlagsView, JobContext, JobRegistry, JobStatus, RunOutcome};
pub use runner::run_job;
pub use source::{FfmpegSource, SourceError, SyntheticSource, VideoSource};
pub use sweep::start_sweeper;
