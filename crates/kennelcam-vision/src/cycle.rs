//! Per-frame detection-tracking cycle.

use std::collections::BTreeMap;
use std::sync::Arc;

use kennelcam_models::{Detection, TrackId, TrackedObjectSnapshot};
use serde::Serialize;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::TrackingConfig;
use crate::detection::{dedupe, sort_by_confidence, DetectionOutcome, Detector};
use crate::error::VisionResult;
use crate::frame::Frame;
use crate::tracking::{ReconciliationEngine, VisualTrackerFactory};

/// Which path a frame took through the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    /// Detector ran and the pool was reconciled with its output
    Detection,
    /// Visual trackers only
    TrackOnly,
    /// Detection frame, but the detector was unavailable
    DetectorFallback,
}

impl PassKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassKind::Detection => "detection",
            PassKind::TrackOnly => "track_only",
            PassKind::DetectorFallback => "detector_fallback",
        }
    }
}

/// What happened on one frame.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub frame_index: u64,
    pub pass: PassKind,
    /// Live objects after the frame
    pub objects: BTreeMap<TrackId, TrackedObjectSnapshot>,
    /// Detections left after class filtering and deduplication
    pub detections_kept: usize,
    /// False only when a detection frame found the detector unavailable
    pub detector_available: bool,
}

/// Drives detection every Nth frame and visual tracking in between.
pub struct FrameCycle {
    engine: ReconciliationEngine,
    detector: Arc<dyn Detector>,
    config: TrackingConfig,
    frame_index: u64,
}

impl FrameCycle {
    /// Create a cycle with an empty object pool retired after
    /// `config.max_time_gap`. Fails if the configuration is invalid.
    pub fn new(
        factory: Arc<dyn VisualTrackerFactory>,
        detector: Arc<dyn Detector>,
        config: TrackingConfig,
    ) -> VisionResult<Self> {
        config.validate()?;
        Ok(Self {
            engine: ReconciliationEngine::new(config.max_time_gap, factory),
            detector,
            config,
            frame_index: 0,
        })
    }

    /// Replace the engine's time source.
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        Self {
            engine: self.engine.with_clock(clock),
            ..self
        }
    }

    /// Run one frame through detection or tracking.
    pub async fn process_frame(&mut self, frame: &Frame) -> CycleReport {
        let frame_index = self.frame_index;
        self.frame_index += 1;

        if frame_index % self.config.detect_every_n_frames != 0 {
            let objects = self.engine.update_trackers(frame);
            return CycleReport {
                frame_index,
                pass: PassKind::TrackOnly,
                objects,
                detections_kept: 0,
                detector_available: true,
            };
        }

        match self.detector.infer(frame).await {
            DetectionOutcome::Detections(raw) => {
                let detections = self.prepare_detections(raw.iter().map(Detection::from_raw));
                let detections_kept = detections.len();
                debug!(
                    frame_index,
                    raw = raw.len(),
                    kept = detections_kept,
                    "Detection pass"
                );

                let objects = self.engine.update_trackers_with_detections(
                    frame,
                    detections,
                    self.config.iou_threshold,
                );
                CycleReport {
                    frame_index,
                    pass: PassKind::Detection,
                    objects,
                    detections_kept,
                    detector_available: true,
                }
            }
            DetectionOutcome::Unavailable(reason) => {
                warn!(
                    frame_index,
                    detector = self.detector.name(),
                    reason = %reason,
                    "Detector unavailable, continuing with visual tracking"
                );
                let objects = self.engine.update_trackers(frame);
                CycleReport {
                    frame_index,
                    pass: PassKind::DetectorFallback,
                    objects,
                    detections_kept: 0,
                    detector_available: false,
                }
            }
        }
    }

    /// Filter to target classes, order by confidence and drop duplicates.
    fn prepare_detections(&self, detections: impl Iterator<Item = Detection>) -> Vec<Detection> {
        let mut detections: Vec<Detection> = detections
            .filter(|d| self.config.is_target(&d.category))
            .collect();
        sort_by_confidence(&mut detections);
        dedupe(detections, self.config.dedupe_iou_threshold)
    }

    pub fn engine(&self) -> &ReconciliationEngine {
        &self.engine
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Index the next processed frame will get.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::detection::ScriptedDetector;
    use crate::tracking::testing::StaticFactory;
    use kennelcam_models::RawDetection;
    use std::time::Duration;

    fn raw(xmin: f64, ymin: f64, xmax: f64, ymax: f64, confidence: f64, name: &str) -> RawDetection {
        RawDetection {
            xmin,
            ymin,
            xmax,
            ymax,
            confidence,
            name: name.to_string(),
        }
    }

    fn cycle(script: Vec<DetectionOutcome>, every: u64) -> FrameCycle {
        let config = TrackingConfig {
            detect_every_n_frames: every,
            ..Default::default()
        };
        FrameCycle::new(
            Arc::new(StaticFactory),
            Arc::new(ScriptedDetector::new(script)),
            config,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_cadence() {
        let mut cycle = cycle(Vec::new(), 3);
        let frame = Frame::filled(64, 64, [0, 0, 0]);

        let mut passes = Vec::new();
        for _ in 0..7 {
            passes.push(cycle.process_frame(&frame).await.pass);
        }

        let (d, t) = (PassKind::Detection, PassKind::TrackOnly);
        assert_eq!(passes, vec![d, t, t, d, t, t, d]);
        assert_eq!(cycle.frame_index(), 7);
    }

    #[tokio::test]
    async fn test_detection_pass_sorts_and_dedupes() {
        let mut cycle = cycle(
            vec![DetectionOutcome::Detections(vec![
                raw(0.0, 0.0, 100.0, 100.0, 0.4, "dog"),
                raw(2.0, 2.0, 102.0, 102.0, 0.9, "dog"),
            ])],
            5,
        );
        let frame = Frame::filled(200, 200, [0, 0, 0]);

        let report = cycle.process_frame(&frame).await;
        assert_eq!(report.pass, PassKind::Detection);
        assert_eq!(report.detections_kept, 1);
        assert_eq!(report.objects.len(), 1);

        // The higher-confidence box survives deduplication
        let snapshot = report.objects.values().next().unwrap();
        assert_eq!(snapshot.bbox.x, 2.0);
    }

    #[test]
    fn test_zero_cadence_rejected() {
        let config = TrackingConfig {
            detect_every_n_frames: 0,
            ..Default::default()
        };
        let detector = Arc::new(ScriptedDetector::default());
        assert!(FrameCycle::new(Arc::new(StaticFactory), detector, config).is_err());
    }

    #[tokio::test]
    async fn test_configured_time_gap_retires_trackers() {
        let clock = Arc::new(ManualClock::default());
        let config = TrackingConfig {
            detect_every_n_frames: 10,
            max_time_gap: Duration::from_secs(1),
            ..Default::default()
        };
        let detector = Arc::new(ScriptedDetector::new([DetectionOutcome::Detections(vec![
            raw(10.0, 10.0, 40.0, 40.0, 0.9, "dog"),
        ])]));
        let mut cycle = FrameCycle::new(Arc::new(StaticFactory), detector, config)
            .unwrap()
            .with_clock(clock.clone());
        let frame = Frame::filled(64, 64, [0, 0, 0]);

        assert_eq!(cycle.process_frame(&frame).await.objects.len(), 1);

        clock.advance(Duration::from_millis(500));
        assert_eq!(cycle.process_frame(&frame).await.objects.len(), 1);

        // Within the engine default, but past the configured gap
        clock.advance(Duration::from_secs(5));
        let report = cycle.process_frame(&frame).await;
        assert_eq!(report.pass, PassKind::TrackOnly);
        assert!(report.objects.is_empty());
    }
}
