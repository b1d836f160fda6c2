//! Deterministic visual trackers for tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use kennelcam_models::BoundingBox;

use super::visual::{VisualTracker, VisualTrackerFactory};
use crate::frame::Frame;

/// Reports the seeded box on every update.
pub struct StaticTracker {
    bbox: BoundingBox,
}

impl VisualTracker for StaticTracker {
    fn update(&mut self, _frame: &Frame) -> Option<BoundingBox> {
        Some(self.bbox)
    }

    fn reseed(&mut self, _frame: &Frame, bbox: &BoundingBox) {
        self.bbox = *bbox;
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

pub struct StaticFactory;

impl VisualTrackerFactory for StaticFactory {
    fn create(&self, _frame: &Frame, bbox: &BoundingBox) -> Box<dyn VisualTracker> {
        Box::new(StaticTracker { bbox: *bbox })
    }
}

/// Never finds its object.
pub struct FailingTracker;

impl VisualTracker for FailingTracker {
    fn update(&mut self, _frame: &Frame) -> Option<BoundingBox> {
        None
    }

    fn reseed(&mut self, _frame: &Frame, _bbox: &BoundingBox) {}

    fn name(&self) -> &'static str {
        "failing"
    }
}

pub struct FailingFactory;

impl VisualTrackerFactory for FailingFactory {
    fn create(&self, _frame: &Frame, _bbox: &BoundingBox) -> Box<dyn VisualTracker> {
        Box::new(FailingTracker)
    }
}

/// Drifts every box by a fixed offset per update.
pub struct DriftingTracker {
    bbox: BoundingBox,
    dx: f64,
}

impl VisualTracker for DriftingTracker {
    fn update(&mut self, _frame: &Frame) -> Option<BoundingBox> {
        self.bbox.x += self.dx;
        Some(self.bbox)
    }

    fn reseed(&mut self, _frame: &Frame, bbox: &BoundingBox) {
        self.bbox = *bbox;
    }

    fn name(&self) -> &'static str {
        "drifting"
    }
}

pub struct DriftingFactory(pub f64);

impl VisualTrackerFactory for DriftingFactory {
    fn create(&self, _frame: &Frame, bbox: &BoundingBox) -> Box<dyn VisualTracker> {
        Box::new(DriftingTracker {
            bbox: *bbox,
            dx: self.0,
        })
    }
}

/// Trackers that succeed until a shared switch is flipped.
#[derive(Clone, Default)]
pub struct SwitchFactory {
    pub lost: Arc<AtomicBool>,
}

struct SwitchTracker {
    bbox: BoundingBox,
    lost: Arc<AtomicBool>,
}

impl VisualTracker for SwitchTracker {
    fn update(&mut self, _frame: &Frame) -> Option<BoundingBox> {
        if self.lost.load(Ordering::SeqCst) {
            None
        } else {
            Some(self.bbox)
        }
    }

    fn reseed(&mut self, _frame: &Frame, bbox: &BoundingBox) {
        self.bbox = *bbox;
    }

    fn name(&self) -> &'static str {
        "switch"
    }
}

impl VisualTrackerFactory for SwitchFactory {
    fn create(&self, _frame: &Frame, bbox: &BoundingBox) -> Box<dyn VisualTracker> {
        Box::new(SwitchTracker {
            bbox: *bbox,
            lost: Arc::clone(&self.lost),
        })
    }
}
