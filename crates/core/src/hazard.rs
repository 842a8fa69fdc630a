//! Smoothing and hazard scoring.
//!
//! [`HazardEngine`] folds raw per-frame fire/smoke confidences into
//! exponential moving averages, derives a hazard score, and decides the
//! discrete escalation state. Pure state-in/state-out; the caller owns the
//! frame loop and the clock.

use crate::rules::{Rules, Thresholds, Weights};
use crate::types::HazardState;

/// Result of feeding one processed frame into the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HazardUpdate {
    pub fire_ema: f64,
    pub smoke_ema: f64,
    pub hazard: f64,
    pub state: HazardState,
}

/// Per-job smoothing state plus the constants it was configured with.
///
/// With raw confidences in `[0, 1]` and alpha in `(0, 1)` both EMAs stay in
/// `[0, 1]`. A frame with no detections must be fed as raw `0.0` so the
/// averages decay instead of holding their last value.
#[derive(Debug, Clone)]
pub struct HazardEngine {
    alpha: f64,
    weights: Weights,
    thresholds: Thresholds,
    fire_ema: f64,
    smoke_ema: f64,
    prev_fire: f64,
    prev_smoke: f64,
    state: HazardState,
}

impl HazardEngine {
    pub fn new(rules: &Rules) -> Self {
        Self {
            alpha: rules.ema_alpha,
            weights: rules.weights,
            thresholds: rules.thresholds,
            fire_ema: 0.0,
            smoke_ema: 0.0,
            prev_fire: 0.0,
            prev_smoke: 0.0,
            state: HazardState::Normal,
        }
    }

    /// Fold one frame's raw confidences in and return the new scores and
    /// state.
    ///
    /// The growth term rewards an increasing trend only: a flat or falling
    /// EMA contributes zero. The hazard value is not clamped; with the
    /// reference weights it stays near `[0, 1.5]`.
    pub fn update(&mut self, raw_fire: f64, raw_smoke: f64) -> HazardUpdate {
        self.fire_ema = self.alpha * raw_fire + (1.0 - self.alpha) * self.fire_ema;
        self.smoke_ema = self.alpha * raw_smoke + (1.0 - self.alpha) * self.smoke_ema;

        let growth = (self.smoke_ema - self.prev_smoke).max(0.0)
            + (self.fire_ema - self.prev_fire).max(0.0);
        let hazard = (self.weights.smoke * self.smoke_ema).max(self.weights.fire * self.fire_ema)
            + self.weights.growth * growth;

        self.prev_fire = self.fire_ema;
        self.prev_smoke = self.smoke_ema;

        self.state = classify(self.fire_ema, self.smoke_ema, hazard, &self.thresholds);

        HazardUpdate {
            fire_ema: self.fire_ema,
            smoke_ema: self.smoke_ema,
            hazard,
            state: self.state,
        }
    }

    /// The state decided on the most recent update.
    pub fn state(&self) -> HazardState {
        self.state
    }
}

/// Decide the escalation state from the current score triple.
///
/// First match wins; the decision depends only on the arguments, so two
/// engines fed the same triple agree regardless of history.
pub fn classify(fire_ema: f64, smoke_ema: f64, hazard: f64, th: &Thresholds) -> HazardState {
    if hazard > th.call_119_hazard {
        HazardState::Call119
    } else if fire_ema > th.fire_growing_fire || hazard > th.fire_growing_hazard {
        HazardState::FireGrowing
    } else if smoke_ema > th.smoke_detected_smoke {
        HazardState::SmokeDetected
    } else if smoke_ema > th.pre_fire_smoke || fire_ema > th.pre_fire_fire {
        HazardState::PreFire
    } else {
        HazardState::Normal
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
