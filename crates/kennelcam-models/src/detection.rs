//! Detections produced by one detection pass.

use serde::{Deserialize, Serialize};

use crate::{BoundingBox, Category};

/// One record as returned by the inference service.
///
/// Coordinates are corners in pixels of the submitted frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    /// Detection confidence score (0.0-1.0)
    pub confidence: f64,
    /// Model label, e.g. "dog"
    pub name: String,
}

/// A detection ready for reconciliation.
///
/// Created fresh on every detection pass and consumed by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Bounding box of the detection
    pub bbox: BoundingBox,
    /// Detected category
    pub category: Category,
    /// Detection confidence score (0.0-1.0)
    pub confidence: f64,
}

impl Detection {
    /// Create a new detection.
    pub fn new(bbox: BoundingBox, category: Category, confidence: f64) -> Self {
        Self {
            bbox,
            category,
            confidence,
        }
    }

    /// Build a detection from a raw record.
    ///
    /// Corners are truncated to whole pixels before the size is derived.
    pub fn from_raw(raw: &RawDetection) -> Self {
        let xmin = raw.xmin.trunc();
        let ymin = raw.ymin.trunc();
        let bbox = BoundingBox::from_xyxy(xmin, ymin, raw.xmax.trunc(), raw.ymax.trunc());

        Self {
            bbox,
            category: Category::from(raw.name.as_str()),
            confidence: raw.confidence,
        }
    }
}

impl From<&RawDetection> for Detection {
    fn from(raw: &RawDetection) -> Self {
        Detection::from_raw(raw)
    }
}
