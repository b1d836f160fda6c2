//! Reconciliation engine: owns the tracked object pool.
//!
//! Uses greedy matching by Intersection over Union to link each detection
//! pass to the objects already being tracked, and retires objects whose
//! visual tracker fails or that have not been seen for too long.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use kennelcam_models::{BoundingBox, Category, Detection, TrackId, TrackedObjectSnapshot};
use tracing::{debug, info, warn};

use super::object::TrackedObject;
use super::visual::VisualTrackerFactory;
use crate::clock::{Clock, SystemClock};
use crate::frame::Frame;

/// Outcome of matching one detection pass against the pool.
#[derive(Debug, Default)]
pub struct MatchResult {
    /// (tracker, detection) pairs, in detection order
    pub matched: Vec<(TrackId, Detection)>,
    /// Detections that claimed no tracker, in input order
    pub unmatched_detections: Vec<Detection>,
    /// Trackers no detection claimed, ascending id
    pub unmatched_trackers: Vec<TrackId>,
}

/// Owns every [`TrackedObject`] and issues their identities.
///
/// Objects are kept in ascending id order, which makes matching
/// deterministic. Ids start at 1 and are never reused.
pub struct ReconciliationEngine {
    /// Live objects, keyed by their own id
    trackers: BTreeMap<TrackId, TrackedObject>,
    /// Next id to assign
    next_id: u64,
    /// Longest allowed gap since an object was last seen
    max_time_gap: Duration,
    factory: Arc<dyn VisualTrackerFactory>,
    clock: Arc<dyn Clock>,
}

impl ReconciliationEngine {
    /// Create an empty engine using the wall clock.
    pub fn new(max_time_gap: Duration, factory: Arc<dyn VisualTrackerFactory>) -> Self {
        Self {
            trackers: BTreeMap::new(),
            next_id: 1,
            max_time_gap,
            factory,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Start tracking a new object and return its id.
    pub fn add_tracker(&mut self, frame: &Frame, bbox: BoundingBox, category: Category) -> TrackId {
        let id = TrackId(self.next_id);
        self.next_id += 1;

        let object = TrackedObject::new(
            id,
            frame,
            bbox,
            category,
            self.factory.as_ref(),
            self.clock.now(),
        );
        debug!(track_id = %id, category = %object.category(), "Tracker added");
        self.trackers.insert(id, object);
        id
    }

    /// Advance every visual tracker by one frame and retire the losers.
    ///
    /// Staleness is judged on the `last_seen` from before this update, so an
    /// object that has been gone too long is retired even if its visual
    /// tracker still reports a box. Returns the surviving objects.
    pub fn update_trackers(&mut self, frame: &Frame) -> BTreeMap<TrackId, TrackedObjectSnapshot> {
        let now = self.clock.now();
        let max_time_gap = self.max_time_gap;
        let mut retained = BTreeMap::new();

        for (id, mut object) in std::mem::take(&mut self.trackers) {
            let was_active = object.is_active(now, max_time_gap);
            let success = object.update(frame, now);

            if !success {
                warn!(track_id = %id, "Tracker failed to update and was removed");
            } else if !was_active {
                info!(track_id = %id, "Tracker inactive and removed");
            } else {
                retained.insert(id, object);
            }
        }

        self.trackers = retained;
        self.snapshots_by_id()
    }

    /// Greedily pair detections with existing trackers.
    ///
    /// Each detection, in input order, claims the unclaimed tracker with the
    /// strictly highest positive IoU that is at least `iou_threshold`; ties
    /// go to the lowest id. This is not a globally optimal assignment: an
    /// early detection can take a tracker a later one overlaps better.
    pub fn match_detections_to_trackers(
        &self,
        detections: Vec<Detection>,
        iou_threshold: f64,
    ) -> MatchResult {
        let mut unmatched_trackers: Vec<TrackId> = self.trackers.keys().copied().collect();
        let mut result = MatchResult::default();

        for detection in detections {
            let mut best: Option<(usize, f64)> = None;

            for (index, track_id) in unmatched_trackers.iter().enumerate() {
                let Some(object) = self.trackers.get(track_id) else {
                    continue;
                };
                let iou = detection.bbox.iou(object.bbox());
                let best_iou = best.map_or(0.0, |(_, best_iou)| best_iou);
                if iou > best_iou && iou >= iou_threshold {
                    best = Some((index, iou));
                }
            }

            match best {
                Some((index, iou)) => {
                    let track_id = unmatched_trackers.remove(index);
                    debug!(track_id = %track_id, iou, "Detection matched");
                    result.matched.push((track_id, detection));
                }
                None => result.unmatched_detections.push(detection),
            }
        }

        result.unmatched_trackers = unmatched_trackers;
        result
    }

    /// Reconcile one detection pass with the pool.
    ///
    /// Matched objects take the detection's box, unmatched detections become
    /// new objects and unmatched objects are removed.
    pub fn update_trackers_with_detections(
        &mut self,
        frame: &Frame,
        detections: Vec<Detection>,
        iou_threshold: f64,
    ) -> BTreeMap<TrackId, TrackedObjectSnapshot> {
        let MatchResult {
            matched,
            unmatched_detections,
            unmatched_trackers,
        } = self.match_detections_to_trackers(detections, iou_threshold);
        let now = self.clock.now();

        for (track_id, detection) in matched {
            if let Some(object) = self.trackers.get_mut(&track_id) {
                object.correct(frame, detection.bbox, now);
            }
        }

        for detection in unmatched_detections {
            self.add_tracker(frame, detection.bbox, detection.category);
        }

        for track_id in unmatched_trackers {
            self.remove_tracker(track_id);
            info!(track_id = %track_id, "Tracker removed due to no match");
        }

        self.snapshots_by_id()
    }

    /// Remove an object. Unknown ids are ignored.
    pub fn remove_tracker(&mut self, id: TrackId) {
        self.trackers.remove(&id);
    }

    /// Snapshot of one object.
    pub fn get(&self, id: TrackId) -> Option<TrackedObjectSnapshot> {
        self.trackers.get(&id).map(TrackedObject::snapshot)
    }

    /// Snapshots of every object, ascending id.
    pub fn snapshots(&self) -> Vec<TrackedObjectSnapshot> {
        self.trackers.values().map(TrackedObject::snapshot).collect()
    }

    fn snapshots_by_id(&self) -> BTreeMap<TrackId, TrackedObjectSnapshot> {
        self.trackers
            .iter()
            .map(|(id, object)| (*id, object.snapshot()))
            .collect()
    }

    /// Id the next new object will receive.
    pub fn next_id(&self) -> TrackId {
        TrackId(self.next_id)
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn object_mut(&mut self, id: TrackId) -> Option<&mut TrackedObject> {
        self.trackers.get_mut(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::tracking::testing::{FailingFactory, StaticFactory};
    use crate::tracking::TemplateTrackerFactory;

    fn frame() -> Frame {
        Frame::filled(1280, 720, [0, 0, 0])
    }

    fn engine() -> ReconciliationEngine {
        ReconciliationEngine::new(Duration::from_secs(30), Arc::new(StaticFactory))
    }

    fn dog_at(x: f64, y: f64, w: f64, h: f64) -> Detection {
        Detection::new(BoundingBox::new(x, y, w, h), Category::Dog, 0.5)
    }

    #[test]
    fn test_add_tracker() {
        let mut engine = engine();
        let bbox = BoundingBox::new(100.0, 100.0, 50.0, 50.0);
        let id = engine.add_tracker(&frame(), bbox, Category::Dog);

        assert_eq!(id, TrackId(1));
        assert_eq!(engine.len(), 1);
        let snapshot = engine.get(id).unwrap();
        assert_eq!(snapshot.bbox, bbox);
        assert_eq!(snapshot.category, Category::Dog);
    }

    #[test]
    fn test_update_trackers_keeps_static_object() {
        let mut engine = ReconciliationEngine::new(
            Duration::from_secs(30),
            Arc::new(TemplateTrackerFactory::default()),
        );
        let id = engine.add_tracker(
            &frame(),
            BoundingBox::new(100.0, 100.0, 50.0, 50.0),
            Category::Dog,
        );

        let updated = engine.update_trackers(&frame());
        assert_eq!(updated.len(), 1);
        assert!(updated.contains_key(&id));
    }

    #[test]
    fn test_update_trackers_removes_inactive() {
        let clock = Arc::new(ManualClock::default());
        let mut engine = engine().with_clock(clock.clone());
        let id = engine.add_tracker(
            &frame(),
            BoundingBox::new(100.0, 100.0, 50.0, 50.0),
            Category::Dog,
        );

        let stale = clock.now() - chrono::Duration::seconds(31);
        engine.object_mut(id).unwrap().set_last_seen(stale);

        let updated = engine.update_trackers(&frame());
        assert!(updated.is_empty());
        assert!(engine.get(id).is_none());
    }

    #[test]
    fn test_update_trackers_removes_after_clock_gap() {
        let clock = Arc::new(ManualClock::default());
        let mut engine = engine().with_clock(clock.clone());
        let id = engine.add_tracker(
            &frame(),
            BoundingBox::new(100.0, 100.0, 50.0, 50.0),
            Category::Dog,
        );

        clock.advance(Duration::from_secs(30));
        assert!(engine.update_trackers(&frame()).contains_key(&id));

        clock.advance(Duration::from_secs(31));
        assert!(engine.update_trackers(&frame()).is_empty());
    }

    #[test]
    fn test_update_trackers_removes_failed() {
        let mut engine =
            ReconciliationEngine::new(Duration::from_secs(30), Arc::new(FailingFactory));
        engine.add_tracker(
            &frame(),
            BoundingBox::new(100.0, 100.0, 50.0, 50.0),
            Category::Dog,
        );

        assert!(engine.update_trackers(&frame()).is_empty());
        assert!(engine.is_empty());
    }

    #[test]
    fn test_match_respects_threshold() {
        let mut engine = engine();
        let id = engine.add_tracker(
            &frame(),
            BoundingBox::new(100.0, 100.0, 50.0, 50.0),
            Category::Dog,
        );
        let detection = dog_at(110.0, 110.0, 50.0, 50.0);
        let iou = detection.bbox.iou(&BoundingBox::new(100.0, 100.0, 50.0, 50.0));
        assert!(iou > 0.45 && iou < 0.5);

        let result = engine.match_detections_to_trackers(vec![detection.clone()], iou);
        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.matched[0].0, id);
        assert!(result.unmatched_detections.is_empty());
        assert!(result.unmatched_trackers.is_empty());

        let result = engine.match_detections_to_trackers(vec![detection], 0.5);
        assert!(result.matched.is_empty());
        assert_eq!(result.unmatched_detections.len(), 1);
        assert_eq!(result.unmatched_trackers, vec![id]);
    }

    #[test]
    fn test_match_with_no_trackers() {
        let engine = engine();
        let detections = vec![dog_at(0.0, 0.0, 10.0, 10.0), dog_at(50.0, 50.0, 10.0, 10.0)];

        let result = engine.match_detections_to_trackers(detections.clone(), 0.3);
        assert!(result.matched.is_empty());
        assert_eq!(result.unmatched_detections, detections);
        assert!(result.unmatched_trackers.is_empty());
    }

    #[test]
    fn test_match_never_pairs_disjoint_at_zero_threshold() {
        let mut engine = engine();
        engine.add_tracker(&frame(), BoundingBox::new(0.0, 0.0, 10.0, 10.0), Category::Dog);

        let result = engine.match_detections_to_trackers(vec![dog_at(500.0, 500.0, 10.0, 10.0)], 0.0);
        assert!(result.matched.is_empty());
        assert_eq!(result.unmatched_trackers.len(), 1);
    }

    #[test]
    fn test_match_one_tracker_per_detection() {
        let mut engine = engine();
        let id = engine.add_tracker(&frame(), BoundingBox::new(0.0, 0.0, 100.0, 100.0), Category::Dog);

        let result = engine.match_detections_to_trackers(
            vec![dog_at(0.0, 0.0, 100.0, 100.0), dog_at(5.0, 5.0, 100.0, 100.0)],
            0.3,
        );
        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.matched[0].0, id);
        assert_eq!(result.unmatched_detections.len(), 1);
    }

    #[test]
    fn test_match_is_greedy_in_detection_order() {
        let mut engine = engine();
        let near = engine.add_tracker(&frame(), BoundingBox::new(0.0, 0.0, 100.0, 100.0), Category::Dog);
        let far = engine.add_tracker(&frame(), BoundingBox::new(60.0, 0.0, 100.0, 100.0), Category::Dog);

        // The first detection overlaps both but `near` more; it claims `near`
        // even though the second detection is an exact fit for it.
        let first = dog_at(20.0, 0.0, 100.0, 100.0);
        let second = dog_at(0.0, 0.0, 100.0, 100.0);
        let result = engine.match_detections_to_trackers(vec![first, second], 0.1);

        assert_eq!(result.matched[0].0, near);
        assert_eq!(result.matched[1].0, far);
        assert!(result.unmatched_trackers.is_empty());
    }

    #[test]
    fn test_match_tie_goes_to_lowest_id() {
        let mut engine = engine();
        let left = engine.add_tracker(&frame(), BoundingBox::new(0.0, 0.0, 100.0, 100.0), Category::Dog);
        let right = engine.add_tracker(&frame(), BoundingBox::new(100.0, 0.0, 100.0, 100.0), Category::Dog);

        let result = engine.match_detections_to_trackers(vec![dog_at(50.0, 0.0, 100.0, 100.0)], 0.1);
        assert_eq!(result.matched[0].0, left);
        assert_eq!(result.unmatched_trackers, vec![right]);
    }

    #[test]
    fn test_ids_never_reused() {
        let mut engine = engine();
        let first = engine.add_tracker(&frame(), BoundingBox::new(0.0, 0.0, 10.0, 10.0), Category::Dog);
        let second = engine.add_tracker(&frame(), BoundingBox::new(20.0, 0.0, 10.0, 10.0), Category::Dog);
        engine.remove_tracker(first);
        let third = engine.add_tracker(&frame(), BoundingBox::new(40.0, 0.0, 10.0, 10.0), Category::Dog);

        assert_ne!(third, first);
        assert_ne!(third, second);
        assert!(third > first);
        assert_eq!(engine.next_id(), TrackId(4));
    }

    #[test]
    fn test_remove_tracker_is_idempotent() {
        let mut engine = engine();
        let id = engine.add_tracker(&frame(), BoundingBox::new(0.0, 0.0, 10.0, 10.0), Category::Dog);

        engine.remove_tracker(id);
        engine.remove_tracker(id);
        engine.remove_tracker(TrackId(99));
        assert!(engine.is_empty());
    }

    #[test]
    fn test_update_trackers_with_detections() {
        let clock = Arc::new(ManualClock::default());
        let mut engine = engine().with_clock(clock.clone());
        let id = engine.add_tracker(
            &frame(),
            BoundingBox::new(100.0, 100.0, 50.0, 50.0),
            Category::Dog,
        );
        let stale = engine.get(id).unwrap().last_seen;

        clock.advance(Duration::from_secs(2));
        let detection = dog_at(110.0, 110.0, 50.0, 50.0);
        let trackers = engine.update_trackers_with_detections(&frame(), vec![detection.clone()], 0.3);

        let snapshot = trackers.get(&id).unwrap();
        assert_eq!(snapshot.bbox, detection.bbox);
        assert!(snapshot.last_seen > stale);
        assert_eq!(trackers.len(), 1);
    }

    #[test]
    fn test_update_trackers_with_detections_adds_and_removes() {
        let mut engine = engine();
        let old = engine.add_tracker(&frame(), BoundingBox::new(0.0, 0.0, 10.0, 10.0), Category::Dog);

        let trackers = engine.update_trackers_with_detections(
            &frame(),
            vec![Detection::new(
                BoundingBox::new(300.0, 300.0, 40.0, 80.0),
                Category::Person,
                0.8,
            )],
            0.3,
        );

        assert!(!trackers.contains_key(&old));
        assert_eq!(trackers.len(), 1);
        let (id, snapshot) = trackers.iter().next().unwrap();
        assert_eq!(*id, TrackId(2));
        assert_eq!(snapshot.category, Category::Person);
    }
}
