//! Queries and the records extracted for them

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ScoutError;

/// Title used when a card yields no extractable title.
pub const UNKNOWN_TITLE: &str = "Unknown";

/// A non-empty search intent.
///
/// Used verbatim both as the cache key and as the `q` parameter of the
/// search URL; near-duplicates like `"Java"` and `"java "` stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Query(String);

impl Query {
    /// Wrap a query string, rejecting empty or whitespace-only input.
    pub fn new(raw: impl Into<String>) -> Result<Self, ScoutError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(ScoutError::EmptyQuery);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One discovered listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Absolute URL, or empty when the card carried no usable link
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub icon: String,
    /// Origin label, e.g. `cursor.directory`
    pub source: String,
    /// Card selector that located this record (empty for featured records)
    #[serde(default)]
    pub selector_used: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub featured: bool,
}

impl ResultRecord {
    /// Build a record, substituting [`UNKNOWN_TITLE`] for a blank title.
    pub fn new(
        title: &str,
        description: &str,
        link: String,
        icon: String,
        source: &str,
        selector_used: &str,
    ) -> Self {
        let title = title.trim();
        Self {
            title: if title.is_empty() {
                UNKNOWN_TITLE.to_string()
            } else {
                title.to_string()
            },
            description: description.trim().to_string(),
            link,
            icon,
            source: source.to_string(),
            selector_used: selector_used.to_string(),
            featured: false,
        }
    }

    /// Mark the record as editorially featured.
    pub fn into_featured(mut self) -> Self {
        self.featured = true;
        self
    }
}
