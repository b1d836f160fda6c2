//! Object categories reported by the detector.
//!
//! The detector's label set is open-ended, so anything that is not one of
//! the categories the app cares about is kept verbatim as `Other`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification label of a detected or tracked object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    /// A dog, the animal the camera is watching for.
    Dog,
    /// A person, displayed as the dogs' owners.
    Person,
    /// Any other label from the model's vocabulary (lowercase).
    Other(String),
}

/// Display plurals that do not follow the "append s" rule.
const PLURAL_OVERRIDES: &[(&str, &str)] = &[("dog", "dogs"), ("person", "owners")];

impl Category {
    /// Returns the label as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Category::Dog => "dog",
            Category::Person => "person",
            Category::Other(label) => label,
        }
    }

    /// Plural used when grouping objects for display.
    pub fn plural(&self) -> String {
        let label = self.as_str();
        PLURAL_OVERRIDES
            .iter()
            .find(|(singular, _)| *singular == label)
            .map(|(_, plural)| (*plural).to_string())
            .unwrap_or_else(|| format!("{}s", label))
    }

    /// Returns true for dogs.
    pub fn is_dog(&self) -> bool {
        matches!(self, Category::Dog)
    }
}

impl From<&str> for Category {
    fn from(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        match label.as_str() {
            "dog" => Category::Dog,
            "person" => Category::Person,
            _ => Category::Other(label),
        }
    }
}

impl From<String> for Category {
    fn from(label: String) -> Self {
        Category::from(label.as_str())
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        match category {
            Category::Other(label) => label,
            other => other.as_str().to_string(),
        }
    }
}

impl FromStr for Category {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Category::from(s))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
