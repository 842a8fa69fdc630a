//! Detection rules: sampling rate, smoothing factor, hazard weights, state
//! thresholds, and the inference parameters forwarded to the detection
//! engine.
//!
//! The defaults are the tuned reference values; deployments override
//! individual knobs by constructing a [`Rules`] and validating it.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Sub-tables
// ---------------------------------------------------------------------------

/// Weights combining smoothed scores into the hazard value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Weights {
    pub smoke: f64,
    pub fire: f64,
    pub growth: f64,
}

/// State-machine thresholds, evaluated in strict priority order
/// (call 119 first, normal last).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Thresholds {
    pub pre_fire_smoke: f64,
    pub pre_fire_fire: f64,
    pub smoke_detected_smoke: f64,
    pub fire_growing_fire: f64,
    pub fire_growing_hazard: f64,
    pub call_119_hazard: f64,
}

/// Parameters passed through to the detection engine on every call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InferenceParams {
    /// Square inference resolution the engine resizes to.
    pub image_size: u32,
    /// Minimum confidence for a box to be returned.
    pub confidence: f64,
    /// IoU threshold for the engine's duplicate suppression.
    pub iou: f64,
    /// Maximum number of boxes per frame.
    pub max_detections: u32,
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// The full rules table for one job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Rules {
    /// Detector invocations per second of video time; together with the
    /// source frame rate this determines the sampling stride.
    pub target_fps: f64,
    /// EMA smoothing factor, in `(0, 1)`. Higher reacts faster.
    pub ema_alpha: f64,
    pub weights: Weights,
    pub thresholds: Thresholds,
    pub inference: InferenceParams,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            target_fps: 5.0,
            ema_alpha: 0.4,
            weights: Weights {
                smoke: 0.6,
                fire: 0.8,
                growth: 0.4,
            },
            thresholds: Thresholds {
                pre_fire_smoke: 0.10,
                pre_fire_fire: 0.08,
                smoke_detected_smoke: 0.25,
                fire_growing_fire: 0.30,
                fire_growing_hazard: 0.35,
                call_119_hazard: 0.45,
            },
            inference: InferenceParams {
                image_size: 416,
                confidence: 0.15,
                iou: 0.20,
                max_detections: 20,
            },
        }
    }
}

impl Rules {
    /// Validate the table.
    ///
    /// Rules:
    /// - `target_fps` must be positive.
    /// - `ema_alpha` must lie strictly inside `(0, 1)` — at 0 the signal
    ///   never moves, at 1 there is no smoothing at all.
    /// - Weights and thresholds must be non-negative.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(self.target_fps > 0.0) {
            return Err(CoreError::Validation(
                "target_fps must be positive".to_string(),
            ));
        }
        if !(self.ema_alpha > 0.0 && self.ema_alpha < 1.0) {
            return Err(CoreError::Validation(format!(
                "ema_alpha must be in (0, 1), got {}",
                self.ema_alpha
            )));
        }
        let weights = [self.weights.smoke, self.weights.fire, self.weights.growth];
        if weights.iter().any(|w| *w < 0.0) {
            return Err(CoreError::Validation(
                "hazard weights must be non-negative".to_string(),
            ));
        }
        let thresholds = [
            self.thresholds.pre_fire_smoke,
            self.thresholds.pre_fire_fire,
            self.thresholds.smoke_detected_smoke,
            self.thresholds.fire_growing_fire,
            self.thresholds.fire_growing_hazard,
            self.thresholds.call_119_hazard,
        ];
        if thresholds.iter().any(|t| *t < 0.0) {
            return Err(CoreError::Validation(
                "thresholds must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
