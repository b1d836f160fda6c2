//! Detector trait and outcome type.
//!
//! Inference itself happens elsewhere (a remote service, a local model);
//! this module only fixes the interface the frame cycle talks to.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use kennelcam_models::RawDetection;

use crate::frame::Frame;

/// What one detector invocation produced.
///
/// "Saw nothing" and "could not look" are different outcomes: the first
/// retires unmatched trackers, the second leaves them to visual tracking.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    /// Inference ran; the list may be empty.
    Detections(Vec<RawDetection>),
    /// Inference could not run for this frame.
    Unavailable(String),
}

impl DetectionOutcome {
    /// Create an unavailable outcome.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    pub fn is_available(&self) -> bool {
        matches!(self, DetectionOutcome::Detections(_))
    }
}

/// Object detection provider.
///
/// Implementations must not fail: errors are reported as
/// [`DetectionOutcome::Unavailable`].
#[async_trait]
pub trait Detector: Send + Sync {
    /// Run inference on a frame.
    async fn infer(&self, frame: &Frame) -> DetectionOutcome;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// Detector that replays a fixed sequence of outcomes.
///
/// Once the script is exhausted every call returns an empty detection list.
/// Used for offline replays and tests.
#[derive(Debug, Default)]
pub struct ScriptedDetector {
    script: Mutex<VecDeque<DetectionOutcome>>,
}

impl ScriptedDetector {
    pub fn new(script: impl IntoIterator<Item = DetectionOutcome>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
        }
    }
}

#[async_trait]
impl Detector for ScriptedDetector {
    async fn infer(&self, _frame: &Frame) -> DetectionOutcome {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| DetectionOutcome::Detections(Vec::new()))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_detector_replays_then_empties() {
        let detector = ScriptedDetector::new([DetectionOutcome::unavailable("offline")]);
        let frame = Frame::filled(8, 8, [0, 0, 0]);

        assert_eq!(
            detector.infer(&frame).await,
            DetectionOutcome::Unavailable("offline".to_string())
        );
        assert_eq!(
            detector.infer(&frame).await,
            DetectionOutcome::Detections(Vec::new())
        );
    }
}
