//! The detection-engine contract.

use async_trait::async_trait;

use pyrowatch_core::types::{Detection, Frame};

/// Error type for detector invocations.
///
/// Every variant is fatal to the calling job: the loop converts it into a
/// terminal `error` event. There is no retry and no per-call timeout — a
/// pathologically slow engine stalls only its own job.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    /// The frame could not be encoded for transport.
    #[error("frame encode error: {0}")]
    Encode(String),

    /// Transport-level failure reaching the engine.
    #[error("detector request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The engine answered with a non-success status.
    #[error("detector engine error (status {status}): {message}")]
    Engine { status: u16, message: String },

    /// The engine's response body did not match the expected shape.
    #[error("invalid detector response: {0}")]
    InvalidResponse(String),
}

/// Contract for the external object-detection engine.
///
/// Implementations must be shareable across job tasks (`Send + Sync`);
/// per-call state belongs in the invocation, not the adapter.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Run detection on one frame.
    ///
    /// A frame with nothing in it returns an empty vector — that is not an
    /// error, and the caller treats it as raw confidence 0.0.
    async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, DetectorError>;
}
