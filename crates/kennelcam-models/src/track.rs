//! Identity and read-only views of tracked objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{BoundingBox, Category};

/// Unique identifier of a tracked object.
///
/// Issued monotonically starting at 1 and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TrackId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Point-in-time copy of a tracked object, safe to hand out to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedObjectSnapshot {
    pub id: TrackId,
    pub bbox: BoundingBox,
    pub category: Category,
    pub last_seen: DateTime<Utc>,
}

impl TrackedObjectSnapshot {
    /// Overlay label, e.g. "Dog ID 3".
    pub fn label(&self) -> String {
        let name = self.category.as_str();
        let mut chars = name.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        };
        format!("{} ID {}", capitalized, self.id)
    }
}
