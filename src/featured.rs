//! Denylist for editorially promoted listings

use async_trait::async_trait;
use tracing::debug;

use crate::browser::{ElementHandle, PageSession};
use crate::cascade::MatchFilter;

/// Case-insensitive keyword denylist.
///
/// A text is "featured" when any keyword occurs in it as a substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeaturedFilter {
    keywords: Vec<String>,
}

impl FeaturedFilter {
    pub fn new<I, K>(keywords: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    /// Keyword found in `text`, if any.
    pub fn matched_keyword(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        self.keywords
            .iter()
            .find(|keyword| lower.contains(keyword.as_str()))
            .map(String::as_str)
    }
}

#[async_trait(?Send)]
impl MatchFilter for FeaturedFilter {
    /// Drop candidates whose text mentions a keyword. Candidates whose text
    /// cannot be read are kept.
    async fn retain(
        &self,
        page: &dyn PageSession,
        candidates: Vec<ElementHandle>,
    ) -> Vec<ElementHandle> {
        let mut kept = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match page.text_content(candidate).await {
                Ok(Some(text)) => {
                    if let Some(keyword) = self.matched_keyword(&text) {
                        debug!("Skipping featured card {} ('{}')", candidate, keyword);
                    } else {
                        kept.push(candidate);
                    }
                }
                _ => kept.push(candidate),
            }
        }
        kept
    }
}
