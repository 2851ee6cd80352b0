//! Error types for browsing, caching and the top-level scout.

use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by a browser capability backend.
///
/// The extraction pipeline treats every one of these as non-fatal: a failing
/// selector moves the cascade on, a failing read leaves a field empty.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The selector could not be parsed or is not supported by the backend.
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// A DOM query was issued before any page was loaded.
    #[error("No page loaded in this session")]
    NotNavigated,

    /// The handle does not belong to the current page.
    #[error("Element handle {0} is not valid for the current page")]
    StaleHandle(usize),

    /// The page could not be loaded.
    #[error("Navigation failed for {url}: {reason}")]
    Navigation { url: String, reason: String },

    /// The page did not load in time.
    #[error("Navigation timed out after {secs}s for {url}")]
    Timeout { url: String, secs: u64 },

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failures of the on-disk query cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize cache entry: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The temp file could not be moved over the target document.
    #[error("Failed to persist cache entry to {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors surfaced by the scout itself.
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("Query must not be empty")]
    EmptyQuery,

    #[error("Invalid base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    Cache(#[from] CacheError),
}
