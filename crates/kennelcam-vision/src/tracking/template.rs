//! Template-matching visual tracker.
//!
//! Keeps the grayscale patch under the seed box and, on every frame,
//! searches a small window around the last position for the offset with
//! the lowest mean absolute difference. Cheap enough to run for every
//! object on every track-only frame.

use image::GrayImage;
use kennelcam_models::BoundingBox;
use tracing::trace;

use super::visual::{VisualTracker, VisualTrackerFactory};
use crate::frame::Frame;

/// Tuning for [`TemplateTracker`].
#[derive(Debug, Clone)]
pub struct TemplateTrackerConfig {
    /// Largest displacement searched per frame, in pixels (default: 16)
    pub search_radius: u32,
    /// Spacing between searched offsets, in pixels (default: 2)
    pub search_step: u32,
    /// Pixel sampling stride inside the template (default: 2)
    pub sample_stride: u32,
    /// Highest mean absolute difference still accepted as a match (default: 30.0)
    pub max_mean_abs_diff: f64,
}

impl Default for TemplateTrackerConfig {
    fn default() -> Self {
        Self {
            search_radius: 16,
            search_step: 2,
            sample_stride: 2,
            max_mean_abs_diff: 30.0,
        }
    }
}

/// Patch position inside the frame.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    x: i64,
    y: i64,
}

/// Visual tracker based on exhaustive local template search.
pub struct TemplateTracker {
    config: TemplateTrackerConfig,
    template: Option<GrayImage>,
    anchor: Anchor,
    bbox: BoundingBox,
}

impl TemplateTracker {
    /// Create a tracker seeded at `bbox`.
    pub fn new(config: TemplateTrackerConfig, frame: &Frame, bbox: &BoundingBox) -> Self {
        let mut tracker = Self {
            config,
            template: None,
            anchor: Anchor { x: 0, y: 0 },
            bbox: *bbox,
        };
        tracker.seed(frame, bbox);
        tracker
    }

    fn seed(&mut self, frame: &Frame, bbox: &BoundingBox) {
        self.bbox = *bbox;
        self.template = None;

        let Some(visible) = bbox.clip_to(frame.width(), frame.height()) else {
            return;
        };

        let x = visible.x.floor().max(0.0) as u32;
        let y = visible.y.floor().max(0.0) as u32;
        let x2 = (visible.x2().ceil() as u32).min(frame.width());
        let y2 = (visible.y2().ceil() as u32).min(frame.height());
        if x2 <= x || y2 <= y {
            return;
        }

        let patch = image::imageops::crop_imm(frame.luma(), x, y, x2 - x, y2 - y).to_image();
        self.anchor = Anchor {
            x: x as i64,
            y: y as i64,
        };
        self.template = Some(patch);
    }

    /// Search offsets, (0, 0) first so a static scene never drifts.
    fn offsets(&self) -> Vec<(i64, i64)> {
        let radius = self.config.search_radius as i64;
        let step = self.config.search_step.max(1) as i64;

        let mut offsets = vec![(0, 0)];
        let mut dy = -radius;
        while dy <= radius {
            let mut dx = -radius;
            while dx <= radius {
                if dx != 0 || dy != 0 {
                    offsets.push((dx, dy));
                }
                dx += step;
            }
            dy += step;
        }
        offsets
    }
}

/// Mean absolute difference between `template` and the frame patch at (x, y).
fn mean_abs_diff(luma: &GrayImage, template: &GrayImage, x: u32, y: u32, stride: u32) -> f64 {
    let stride = stride.max(1) as usize;
    let mut total: u64 = 0;
    let mut count: u64 = 0;

    for ty in (0..template.height()).step_by(stride) {
        for tx in (0..template.width()).step_by(stride) {
            let a = template.get_pixel(tx, ty).0[0];
            let b = luma.get_pixel(x + tx, y + ty).0[0];
            total += a.abs_diff(b) as u64;
            count += 1;
        }
    }

    if count == 0 {
        f64::INFINITY
    } else {
        total as f64 / count as f64
    }
}

impl VisualTracker for TemplateTracker {
    fn update(&mut self, frame: &Frame) -> Option<BoundingBox> {
        let template = self.template.as_ref()?;
        let (frame_w, frame_h) = (frame.width() as i64, frame.height() as i64);
        let (tw, th) = (template.width() as i64, template.height() as i64);

        let mut best: Option<((i64, i64), f64)> = None;
        for (dx, dy) in self.offsets() {
            let x = self.anchor.x + dx;
            let y = self.anchor.y + dy;
            if x < 0 || y < 0 || x + tw > frame_w || y + th > frame_h {
                continue;
            }

            let score = mean_abs_diff(
                frame.luma(),
                template,
                x as u32,
                y as u32,
                self.config.sample_stride,
            );
            if best.map_or(true, |(_, best_score)| score < best_score) {
                best = Some(((dx, dy), score));
            }
        }

        let ((dx, dy), score) = best?;
        trace!(dx, dy, score, "Template search finished");
        if score > self.config.max_mean_abs_diff {
            return None;
        }

        self.anchor.x += dx;
        self.anchor.y += dy;
        self.bbox = BoundingBox::new(
            self.bbox.x + dx as f64,
            self.bbox.y + dy as f64,
            self.bbox.width,
            self.bbox.height,
        );
        Some(self.bbox)
    }

    fn reseed(&mut self, frame: &Frame, bbox: &BoundingBox) {
        self.seed(frame, bbox);
    }

    fn name(&self) -> &'static str {
        "template"
    }
}

/// Builds [`TemplateTracker`]s sharing one configuration.
#[derive(Debug, Clone, Default)]
pub struct TemplateTrackerFactory {
    config: TemplateTrackerConfig,
}

impl TemplateTrackerFactory {
    pub fn new(config: TemplateTrackerConfig) -> Self {
        Self { config }
    }
}

impl VisualTrackerFactory for TemplateTrackerFactory {
    fn create(&self, frame: &Frame, bbox: &BoundingBox) -> Box<dyn VisualTracker> {
        Box::new(TemplateTracker::new(self.config.clone(), frame, bbox))
    }
}
