//! Video frame sources.
//!
//! The pipeline only assumes a component that can open a video, report
//! its metadata, and yield rgb24 frames in order, with a non-surfacing
//! `skip_frame` so the pacer can win back lag without handing frames to
//! the detector. [`FfmpegSource`] implements that against `ffprobe` +
//! `ffmpeg`; [`SyntheticSource`] drives tests.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};

use pyrowatch_core::types::{Frame, VideoMeta};

/// Frame rate assumed when the container does not report one.
const FALLBACK_FPS: f64 = 25.0;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for video-source operations. All variants are fatal to the
/// job that hit them.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    BinaryNotFound(std::io::Error),

    #[error("ffprobe execution failed (exit code {exit_code:?}): {stderr}")]
    ProbeFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("no video stream in {0}")]
    NoVideoStream(String),

    #[error("video file not found: {0}")]
    VideoNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Ordered frame supply for one job.
///
/// Implementations number frames from 0 and advance the index on both
/// [`next_frame`](VideoSource::next_frame) and
/// [`skip_frame`](VideoSource::skip_frame), so indices stay accurate
/// across catch-up skips.
#[async_trait]
pub trait VideoSource: Send {
    fn meta(&self) -> &VideoMeta;

    /// Decode and return the next frame, or `None` at end of stream.
    async fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;

    /// Advance one frame without surfacing it. Returns `false` at end of
    /// stream.
    async fn skip_frame(&mut self) -> Result<bool, SourceError>;
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    /// e.g. "30/1" or "24000/1001"
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

/// Parse an ffprobe rational frame rate (`"30/1"`, `"24000/1001"`, `"25"`).
fn parse_frame_rate(raw: &str) -> Option<f64> {
    let mut parts = raw.splitn(2, '/');
    let num: f64 = parts.next()?.trim().parse().ok()?;
    let rate = match parts.next() {
        Some(den) => {
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => num,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// Run `ffprobe` on a video file and extract the pipeline's metadata.
async fn probe(path: &Path) -> Result<VideoMeta, SourceError> {
    if !path.exists() {
        return Err(SourceError::VideoNotFound(
            path.to_string_lossy().to_string(),
        ));
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_streams",
            "-select_streams",
            "v:0",
        ])
        .arg(path)
        .output()
        .await
        .map_err(SourceError::BinaryNotFound)?;

    if !output.status.success() {
        return Err(SourceError::ProbeFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let parsed: FfprobeOutput = serde_json::from_slice(&output.stdout)
        .map_err(|e| SourceError::ParseError(e.to_string()))?;

    let stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| SourceError::NoVideoStream(path.to_string_lossy().to_string()))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(SourceError::ParseError(
                "video stream reports no resolution".to_string(),
            ))
        }
    };

    let fps = stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .unwrap_or(FALLBACK_FPS);

    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0);

    Ok(VideoMeta {
        fps,
        width,
        height,
        frame_count,
    })
}

// ---------------------------------------------------------------------------
// FfmpegSource
// ---------------------------------------------------------------------------

/// Frame source backed by an `ffmpeg` child process piping rgb24 frames
/// on stdout.
pub struct FfmpegSource {
    meta: VideoMeta,
    /// Held so the decoder dies with the source.
    _child: Child,
    stdout: ChildStdout,
    frame_len: usize,
    next_index: u64,
}

impl FfmpegSource {
    /// Probe the file and start the decoder.
    pub async fn open(path: PathBuf) -> Result<Self, SourceError> {
        let meta = probe(&path).await?;

        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(&path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(SourceError::BinaryNotFound)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SourceError::ParseError("ffmpeg stdout not captured".to_string()))?;

        tracing::debug!(
            path = %path.display(),
            fps = meta.fps,
            width = meta.width,
            height = meta.height,
            "Video source opened"
        );

        Ok(Self {
            meta,
            frame_len: meta.width as usize * meta.height as usize * 3,
            _child: child,
            stdout,
            next_index: 0,
        })
    }

    /// Read one frame's worth of bytes, or `None` at end of stream.
    async fn read_raw(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        let mut buf = vec![0u8; self.frame_len];
        match self.stdout.read_exact(&mut buf).await {
            Ok(_) => Ok(Some(buf)),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl VideoSource for FfmpegSource {
    fn meta(&self) -> &VideoMeta {
        &self.meta
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        match self.read_raw().await? {
            Some(data) => {
                let index = self.next_index;
                self.next_index += 1;
                Ok(Some(Frame {
                    index,
                    width: self.meta.width,
                    height: self.meta.height,
                    data,
                }))
            }
            None => Ok(None),
        }
    }

    async fn skip_frame(&mut self) -> Result<bool, SourceError> {
        match self.read_raw().await? {
            Some(_) => {
                self.next_index += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// SyntheticSource
// ---------------------------------------------------------------------------

/// Fixed-length source of uniform frames, for tests.
pub struct SyntheticSource {
    meta: VideoMeta,
    total: u64,
    next_index: u64,
    skipped: Arc<AtomicU64>,
}

impl SyntheticSource {
    pub fn new(fps: f64, width: u32, height: u32, total: u64) -> Self {
        Self {
            meta: VideoMeta {
                fps,
                width,
                height,
                frame_count: total,
            },
            total,
            next_index: 0,
            skipped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared counter of frames consumed via
    /// [`skip_frame`](VideoSource::skip_frame); clone it before handing
    /// the source to a runner.
    pub fn skip_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.skipped)
    }
}

#[async_trait]
impl VideoSource for SyntheticSource {
    fn meta(&self) -> &VideoMeta {
        &self.meta
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        if self.next_index >= self.total {
            return Ok(None);
        }
        let index = self.next_index;
        self.next_index += 1;
        Ok(Some(Frame {
            index,
            width: self.meta.width,
            height: self.meta.height,
            data: vec![0u8; self.meta.width as usize * self.meta.height as usize * 3],
        }))
    }

    async fn skip_frame(&mut self) -> Result<bool, SourceError> {
        if self.next_index >= self.total {
            return Ok(false);
        }
        self.next_index += 1;
        self.skipped.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
