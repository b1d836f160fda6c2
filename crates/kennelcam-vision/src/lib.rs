//! Detection-tracking core for kennelcam.
//!
//! This crate provides:
//! - Duplicate suppression for detector output
//! - Per-object visual tracking behind a pluggable trait
//! - The reconciliation engine that owns object identities
//! - The per-frame cycle alternating detection and tracking passes
//! - Frame sources for replaying captured footage

pub mod clock;
pub mod config;
pub mod cycle;
pub mod detection;
pub mod error;
pub mod frame;
pub mod source;
pub mod tracking;


pub use clock::{Clock, ManualClock, SystemClock};
pub use config::TrackingConfig;
pub use cycle::{CycleReport, FrameCycle, PassKind};
pub use detection::{dedupe, DetectionOutcome, Detector, ScriptedDetector};
pub use error::{VisionError, VisionResult};
pub use frame::Frame;
pub use source::{FrameSource, ImageSequenceSource};
pub use tracking::{
    MatchResult, ReconciliationEngine, TemplateTracker, TemplateTrackerConfig,
    TemplateTrackerFactory, TrackedObject, VisualTracker, VisualTrackerFactory,
};
