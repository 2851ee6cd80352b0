//! Configuration for the scout.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::ScoutError;
use crate::record::Query;

/// Runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoutConfig {
    /// Search page; queries are appended as `?q=<query>`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path marker identifying listing links; also the prefix for bare identifiers.
    #[serde(default = "default_link_subpath")]
    pub link_subpath: String,
    /// Label stored in every record's `source` field.
    #[serde(default = "default_source_label")]
    pub source_label: String,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,
    /// Pause after navigation for client-side rendering to settle.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Case-insensitive denylist for promoted listings.
    #[serde(default = "default_featured_keywords")]
    pub featured_keywords: Vec<String>,
    /// Let a card selector whose candidates were all filtered out fall
    /// through to the next selector.
    #[serde(default)]
    pub card_fallthrough: bool,
}

fn default_base_url() -> String {
    "https://cursor.directory/mcp".to_string()
}

fn default_link_subpath() -> String {
    "/mcp/".to_string()
}

fn default_source_label() -> String {
    "cursor.directory".to_string()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("mcp_cache")
}

fn default_navigation_timeout() -> u64 {
    30
}

fn default_settle_delay() -> u64 {
    3000
}

fn default_user_agent() -> String {
    concat!(
        "Mozilla/5.0 (compatible; mcp-scout/",
        env!("CARGO_PKG_VERSION"),
        ")"
    )
    .to_string()
}

/// Curated entries the directory promotes on every page.
pub fn default_featured_keywords() -> Vec<String> {
    ["postman", "byterover", "bucket", "allthingsdev", "mailtrap", "endgame"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            link_subpath: default_link_subpath(),
            source_label: default_source_label(),
            cache_dir: default_cache_dir(),
            navigation_timeout_secs: default_navigation_timeout(),
            settle_delay_ms: default_settle_delay(),
            user_agent: default_user_agent(),
            featured_keywords: default_featured_keywords(),
            card_fallthrough: false,
        }
    }
}

impl ScoutConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    #[must_use]
    pub fn with_navigation_timeout_secs(mut self, secs: u64) -> Self {
        self.navigation_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn with_settle_delay_ms(mut self, millis: u64) -> Self {
        self.settle_delay_ms = millis;
        self
    }

    #[must_use]
    pub fn with_featured_keywords<I, K>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.featured_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_card_fallthrough(mut self, enabled: bool) -> Self {
        self.card_fallthrough = enabled;
        self
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    fn parsed_base_url(&self) -> Result<Url, ScoutError> {
        Url::parse(&self.base_url).map_err(|source| ScoutError::InvalidBaseUrl {
            url: self.base_url.clone(),
            source,
        })
    }

    /// Scheme, host and port of the base URL, e.g. `https://cursor.directory`.
    pub fn origin(&self) -> Result<String, ScoutError> {
        Ok(self.parsed_base_url()?.origin().ascii_serialization())
    }

    /// Host of the base URL, e.g. `cursor.directory`.
    pub fn domain(&self) -> Result<String, ScoutError> {
        let url = self.parsed_base_url()?;
        Ok(url.host_str().unwrap_or_default().to_string())
    }

    /// Search page URL for a query.
    pub fn search_url(&self, query: &Query) -> String {
        format!(
            "{}?q={}",
            self.base_url,
            urlencoding::encode(query.as_str())
        )
    }
}
