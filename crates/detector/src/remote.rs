//! HTTP client for a remote inference server.
//!
//! Frames are JPEG-encoded and posted as multipart to the engine's
//! `/detect` endpoint together with the inference parameters from the
//! rules table. The engine answers
//! `{"boxes": [{x1, y1, x2, y2, cls, conf}, ...]}`; boxes whose class is
//! neither `fire` nor `smoke` are dropped here so the pipeline only ever
//! sees the two classes it scores.

use async_trait::async_trait;
use serde::Deserialize;

use pyrowatch_core::rules::InferenceParams;
use pyrowatch_core::types::{BoundingBox, Detection, DetectionClass, Frame};

use crate::adapter::{Detector, DetectorError};

/// JPEG quality for frame uploads.
const JPEG_QUALITY: u8 = 85;

/// Detection client against a remote inference server.
pub struct HttpDetector {
    client: reqwest::Client,
    /// Base URL of the engine, e.g. `http://127.0.0.1:8600`.
    base_url: String,
    params: InferenceParams,
}

/// One box as returned by the engine.
#[derive(Debug, Deserialize)]
struct RemoteBox {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    cls: String,
    conf: f64,
}

/// Engine response envelope.
#[derive(Debug, Deserialize)]
struct DetectResponse {
    boxes: Vec<RemoteBox>,
}

impl HttpDetector {
    /// Create a detector client with its own connection pool.
    pub fn new(base_url: String, params: InferenceParams) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            params,
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`] (shared
    /// connection pool).
    pub fn with_client(client: reqwest::Client, base_url: String, params: InferenceParams) -> Self {
        Self {
            client,
            base_url,
            params,
        }
    }

    fn encode_jpeg(frame: &Frame) -> Result<Vec<u8>, DetectorError> {
        let mut jpeg = Vec::new();
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
        encoder
            .encode(
                &frame.data,
                frame.width,
                frame.height,
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| DetectorError::Encode(e.to_string()))?;
        Ok(jpeg)
    }
}

#[async_trait]
impl Detector for HttpDetector {
    async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, DetectorError> {
        let jpeg = Self::encode_jpeg(frame)?;

        let part = reqwest::multipart::Part::bytes(jpeg)
            .file_name(format!("frame-{}.jpg", frame.index))
            .mime_str("image/jpeg")
            .map_err(DetectorError::Request)?;

        let form = reqwest::multipart::Form::new()
            .part("image", part)
            .text("imgsz", self.params.image_size.to_string())
            .text("conf", self.params.confidence.to_string())
            .text("iou", self.params.iou.to_string())
            .text("max_det", self.params.max_detections.to_string());

        let response = self
            .client
            .post(format!("{}/detect", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DetectorError::Engine {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: DetectResponse = response
            .json()
            .await
            .map_err(|e| DetectorError::InvalidResponse(e.to_string()))?;

        let detections = parsed
            .boxes
            .into_iter()
            .filter_map(|b| {
                let cls = match b.cls.as_str() {
                    "fire" => DetectionClass::Fire,
                    "smoke" => DetectionClass::Smoke,
                    other => {
                        tracing::debug!(class = other, "Ignoring detection of unscored class");
                        return None;
                    }
                };
                Some(Detection {
                    bbox: BoundingBox {
                        x1: b.x1,
                        y1: b.y1,
                        x2: b.x2,
                        y2: b.y2,
                    },
                    cls,
                    conf: b.conf,
                })
            })
            .collect();

        Ok(detections)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
