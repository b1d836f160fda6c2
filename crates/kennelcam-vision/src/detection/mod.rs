//! Detection side of the cycle: the detector seam and duplicate suppression.

pub mod dedupe;
pub mod providers;

pub use dedupe::{dedupe, sort_by_confidence};
pub use providers::{DetectionOutcome, Detector, ScriptedDetector};
