//! A tracked object: identity, category and its own visual tracker.

use std::time::Duration;

use chrono::{DateTime, Utc};
use kennelcam_models::{BoundingBox, Category, TrackId, TrackedObjectSnapshot};

use super::visual::{VisualTracker, VisualTrackerFactory};
use crate::frame::Frame;

/// Stateful wrapper around one visual tracker.
///
/// The object never retires itself; the engine decides when it goes away
/// based on [`TrackedObject::update`] and [`TrackedObject::is_active`].
pub struct TrackedObject {
    id: TrackId,
    bbox: BoundingBox,
    category: Category,
    last_seen: DateTime<Utc>,
    tracker: Box<dyn VisualTracker>,
}

impl TrackedObject {
    /// Create an object and seed its visual tracker at `bbox`.
    pub fn new(
        id: TrackId,
        frame: &Frame,
        bbox: BoundingBox,
        category: Category,
        factory: &dyn VisualTrackerFactory,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            bbox,
            category,
            last_seen: now,
            tracker: factory.create(frame, &bbox),
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }

    /// Advance the visual tracker by one frame.
    ///
    /// On success the box is replaced and `last_seen` refreshed. On failure
    /// nothing changes and `false` is returned.
    pub fn update(&mut self, frame: &Frame, now: DateTime<Utc>) -> bool {
        match self.tracker.update(frame) {
            Some(bbox) => {
                self.bbox = bbox;
                self.last_seen = now;
                true
            }
            None => false,
        }
    }

    /// Whether the object was seen within `max_time_gap` of `now`.
    pub fn is_active(&self, now: DateTime<Utc>, max_time_gap: Duration) -> bool {
        let elapsed = now.signed_duration_since(self.last_seen);
        match elapsed.to_std() {
            Ok(elapsed) => elapsed <= max_time_gap,
            // last_seen is in the future
            Err(_) => true,
        }
    }

    /// Overwrite the box with a detection's box.
    ///
    /// Detections are trusted over the visual tracker's estimate, so the
    /// tracker is re-seeded at the new box as well.
    pub fn correct(&mut self, frame: &Frame, bbox: BoundingBox, now: DateTime<Utc>) {
        self.bbox = bbox;
        self.last_seen = now;
        self.tracker.reseed(frame, &bbox);
    }

    /// Read-only copy for callers.
    pub fn snapshot(&self) -> TrackedObjectSnapshot {
        TrackedObjectSnapshot {
            id: self.id,
            bbox: self.bbox,
            category: self.category.clone(),
            last_seen: self.last_seen,
        }
    }

    #[cfg(test)]
    pub(crate) fn set_last_seen(&mut self, last_seen: DateTime<Utc>) {
        self.last_seen = last_seen;
    }
}

impl std::fmt::Debug for TrackedObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedObject")
            .field("id", &self.id)
            .field("bbox", &self.bbox)
            .field("category", &self.category)
            .field("last_seen", &self.last_seen)
            .field("tracker", &self.tracker.name())
            .finish()
    }
}
