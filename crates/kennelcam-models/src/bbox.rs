//! Axis-aligned bounding boxes in pixel coordinates.

use serde::{Deserialize, Serialize};

/// Bounding box in pixel coordinates.
///
/// Width and height are expected to be non-negative but this is not enforced;
/// degenerate boxes simply never overlap anything.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge x-coordinate
    pub x: f64,
    /// Top edge y-coordinate
    pub y: f64,
    /// Box width
    pub width: f64,
    /// Box height
    pub height: f64,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Create a box from its top-left and bottom-right corners.
    pub fn from_xyxy(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        }
    }

    /// Right edge x-coordinate.
    #[inline]
    pub fn x2(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge y-coordinate.
    #[inline]
    pub fn y2(&self) -> f64 {
        self.y + self.height
    }

    /// Box area in pixels.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Area shared with another box, zero when they do not overlap.
    pub fn intersection_area(&self, other: &BoundingBox) -> f64 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.x2().min(other.x2());
        let y2 = self.y2().min(other.y2());

        (x2 - x1).max(0.0) * (y2 - y1).max(0.0)
    }

    /// Compute Intersection over Union with another box.
    ///
    /// Returns 0.0 when the union area is not positive, so zero-area boxes
    /// never match anything. NaN coordinates also collapse to 0.0.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            let iou = intersection / union;
            if iou.is_finite() {
                iou.clamp(0.0, 1.0)
            } else {
                0.0
            }
        } else {
            0.0
        }
    }

    /// Intersect the box with a `width` x `height` frame.
    ///
    /// Returns `None` when nothing of the box lies inside the frame.
    pub fn clip_to(&self, width: u32, height: u32) -> Option<BoundingBox> {
        let x1 = self.x.max(0.0);
        let y1 = self.y.max(0.0);
        let x2 = self.x2().min(width as f64);
        let y2 = self.y2().min(height as f64);

        if x2 > x1 && y2 > y1 {
            Some(BoundingBox::from_xyxy(x1, y1, x2, y2))
        } else {
            None
        }
    }
}
