//! Duplicate suppression for one frame's detections.

use kennelcam_models::Detection;

/// Drop detections that overlap an earlier kept detection.
///
/// Greedy single pass in input order: a detection is kept unless its IoU
/// with any already kept box is strictly greater than `iou_threshold`.
/// The first of a group of duplicates wins, so callers that care about
/// which one survives must order the input (e.g. by descending confidence).
/// Output preserves input order. O(n^2) in the detection count.
pub fn dedupe(detections: Vec<Detection>, iou_threshold: f64) -> Vec<Detection> {
    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());

    for detection in detections {
        let duplicate = kept
            .iter()
            .any(|k| k.bbox.iou(&detection.bbox) > iou_threshold);
        if !duplicate {
            kept.push(detection);
        }
    }

    kept
}

/// Stable sort by descending confidence. NaN confidences sort last.
pub fn sort_by_confidence(detections: &mut [Detection]) {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or_else(|| a.confidence.is_nan().cmp(&b.confidence.is_nan()))
    });
}
