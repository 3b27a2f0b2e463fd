use serde::{Deserialize, Serialize};
use std::fmt;

/// Sidecar `ImageType` field kept as its ordered tag list
///
/// The order is significant: two series with the same tags in a different
/// order are different series. The first two tags conventionally carry the
/// pixel provenance (`ORIGINAL`/`DERIVED`) and the exam role
/// (`PRIMARY`/`SECONDARY`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageType {
    pub tags: Vec<String>,
}

impl ImageType {
    /// Creates a new ImageType
    pub fn new(tags: Vec<String>) -> Self {
        Self { tags }
    }

    /// First tag (e.g. "ORIGINAL", "DERIVED")
    pub fn pixels(&self) -> Option<&str> {
        self.tags.first().map(String::as_str)
    }

    /// Second tag (e.g. "PRIMARY", "SECONDARY")
    pub fn exam(&self) -> Option<&str> {
        self.tags.get(1).map(String::as_str)
    }

    /// Returns a simple string representation
    ///
    /// Format: "tag1|tag2|..."; empty tags are skipped
    pub fn simple_repr(&self) -> String {
        self.tags
            .iter()
            .filter(|t| !t.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("|")
    }

    /// Checks if the image type contains a specific tag (exact match)
    pub fn contains(&self, val: &str) -> bool {
        self.tags.iter().any(|t| t == val)
    }

    /// Checks if any of the given tags is present (exact match)
    pub fn contains_any(&self, vals: &[&str]) -> bool {
        vals.iter().any(|v| self.contains(v))
    }

    /// Lowercased tags, for case-insensitive lookups
    pub fn lowercase_tags(&self) -> Vec<String> {
        self.tags.iter().map(|t| t.to_lowercase()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl From<Vec<String>> for ImageType {
    fn from(tags: Vec<String>) -> Self {
        Self::new(tags)
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.simple_repr())
    }
}
