//! Multi-object tracking.
//!
//! Each tracked object carries its own single-object [`VisualTracker`]; the
//! [`ReconciliationEngine`] owns all of them and reconciles the pool with
//! periodic detection passes.

pub mod engine;
pub mod object;
pub mod template;
pub mod visual;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{MatchResult, ReconciliationEngine};
pub use object::TrackedObject;
pub use template::{TemplateTracker, TemplateTrackerConfig, TemplateTrackerFactory};
pub use visual::{VisualTracker, VisualTrackerFactory};
