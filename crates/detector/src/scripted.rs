//! Scripted detector for tests.

use std::sync::Mutex;

use async_trait::async_trait;

use pyrowatch_core::types::{BoundingBox, Detection, DetectionClass, Frame};

use crate::adapter::{Detector, DetectorError};

/// Replays a fixed sequence of per-frame detection sets.
///
/// Call `n` returns script entry `n`; once the script is exhausted every
/// further call returns no detections. Used to drive the pipeline through
/// known score trajectories without an engine.
pub struct ScriptedDetector {
    script: Mutex<std::vec::IntoIter<Vec<Detection>>>,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Vec<Detection>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter()),
        }
    }

    /// A detector that never sees anything.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Script a confidence ramp: one full-frame box per call with the
    /// given class and confidence.
    pub fn ramp(cls: DetectionClass, confidences: &[f64]) -> Self {
        let script = confidences
            .iter()
            .map(|conf| {
                vec![Detection {
                    bbox: BoundingBox {
                        x1: 0.0,
                        y1: 0.0,
                        x2: 100.0,
                        y2: 100.0,
                    },
                    cls,
                    conf: *conf,
                }]
            })
            .collect();
        Self::new(script)
    }
}

#[async_trait]
impl Detector for ScriptedDetector {
    async fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>, DetectorError> {
        let next = self.script.lock().expect("script lock poisoned").next();
        Ok(next.unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame {
            index: 0,
            width: 4,
            height: 4,
            data: vec![0; 4 * 4 * 3],
        }
    }

    #[tokio::test]
    async fn replays_script_then_empties() {
        let detector = ScriptedDetector::ramp(DetectionClass::Fire, &[0.5, 0.9]);
        assert_eq!(detector.detect(&frame()).await.unwrap()[0].conf, 0.5);
        assert_eq!(detector.detect(&frame()).await.unwrap()[0].conf, 0.9);
        assert!(detector.detect(&frame()).await.unwrap().is_empty());
    }
}
