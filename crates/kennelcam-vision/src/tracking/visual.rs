//! Single-object visual tracker seam.
//!
//! The engine only needs "follow this box into the next frame"; the
//! algorithm behind it is pluggable.

use kennelcam_models::BoundingBox;

use crate::frame::Frame;

/// Follows one object from frame to frame.
pub trait VisualTracker: Send {
    /// Estimate the object's box in `frame`.
    ///
    /// Returns `None` when the object could not be found.
    fn update(&mut self, frame: &Frame) -> Option<BoundingBox>;

    /// Restart tracking from a known-good box.
    fn reseed(&mut self, frame: &Frame, bbox: &BoundingBox);

    /// Tracker name for logging.
    fn name(&self) -> &'static str;
}

/// Creates one visual tracker per tracked object.
pub trait VisualTrackerFactory: Send + Sync {
    /// Create a tracker seeded at `bbox` in `frame`.
    fn create(&self, frame: &Frame, bbox: &BoundingBox) -> Box<dyn VisualTracker>;
}
