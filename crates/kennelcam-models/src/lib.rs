//! Shared data models for kennelcam.
//!
//! This crate provides Serde-serializable types for:
//! - Bounding boxes and IoU
//! - Object categories and their display plurals
//! - Raw and reconciled detections
//! - Track identities and tracked object snapshots

pub mod bbox;
pub mod category;
pub mod detection;
pub mod track;

// Re-export common types
pub use bbox::BoundingBox;
pub use category::Category;
pub use detection::{Detection, RawDetection};
pub use track::{TrackId, TrackedObjectSnapshot};
