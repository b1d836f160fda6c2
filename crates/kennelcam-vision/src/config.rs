//! Configuration for the detection-tracking cycle.

use std::collections::BTreeSet;
use std::time::Duration;

use kennelcam_models::Category;
use serde::{Deserialize, Serialize};

use crate::error::{VisionError, VisionResult};

/// Configuration for detection, deduplication and tracker retirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    // === Matching ===
    /// Minimum IoU for a detection to claim an existing tracker (default: 0.3)
    pub iou_threshold: f64,

    /// IoU above which two detections of one frame are duplicates (default: 0.5)
    pub dedupe_iou_threshold: f64,

    // === Cadence ===
    /// Run the detector on every Nth frame, track-only otherwise (default: 5)
    pub detect_every_n_frames: u64,

    /// Categories worth tracking; detections of anything else are dropped
    pub target_classes: BTreeSet<Category>,

    // === Retirement ===
    /// Longest time a tracker may go without being seen (default: 30s)
    pub max_time_gap: Duration,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.3,
            dedupe_iou_threshold: 0.5,
            detect_every_n_frames: 5,
            target_classes: [Category::Dog, Category::Person].into_iter().collect(),
            max_time_gap: Duration::from_secs(30),
        }
    }
}

impl TrackingConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            iou_threshold: std::env::var("DETECTION_IOU_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.iou_threshold),
            dedupe_iou_threshold: std::env::var("DETECTION_DEDUPE_IOU_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.dedupe_iou_threshold),
            detect_every_n_frames: std::env::var("DETECTION_EVERY_N_FRAMES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.detect_every_n_frames),
            target_classes: std::env::var("DETECTION_CLASSES")
                .map(|s| parse_classes(&s))
                .unwrap_or(defaults.target_classes),
            max_time_gap: std::env::var("TRACKER_MAX_TIME_GAP_SECS")
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(Duration::from_secs_f64)
                .unwrap_or(defaults.max_time_gap),
        }
    }

    /// Check that the values can drive the cycle.
    pub fn validate(&self) -> VisionResult<()> {
        if self.detect_every_n_frames == 0 {
            return Err(VisionError::invalid_config(
                "detect_every_n_frames must be at least 1",
            ));
        }

        for (name, value) in [
            ("iou_threshold", self.iou_threshold),
            ("dedupe_iou_threshold", self.dedupe_iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(VisionError::invalid_config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }

    /// Whether detections of this category should be kept.
    pub fn is_target(&self, category: &Category) -> bool {
        self.target_classes.contains(category)
    }
}

/// Parse a comma-separated class list such as `"dog, person"`.
pub fn parse_classes(list: &str) -> BTreeSet<Category> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Category::from)
        .collect()
}
