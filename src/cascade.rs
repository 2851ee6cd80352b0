//! Selector cascades: ordered fallback selectors tried until one matches
//!
//! The target site's markup is not under our control and changes without
//! notice, so every extraction target is described by a list of candidate
//! selectors in priority order rather than a single query. A cascade
//! evaluation tries each candidate in turn, swallows backend failures
//! (malformed or unsupported selectors, transient query errors), and
//! reports which selector produced the winning match.

use async_trait::async_trait;
use tracing::debug;

use crate::browser::{ElementHandle, PageSession, Scope};

/// Non-empty, ordered list of selectors. Earlier entries win.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorCascade {
    selectors: Vec<String>,
}

impl SelectorCascade {
    /// Build a cascade from a first selector and any number of fallbacks.
    pub fn of(first: &str, rest: &[&str]) -> Self {
        let mut selectors = Vec::with_capacity(rest.len() + 1);
        selectors.push(first.to_string());
        selectors.extend(rest.iter().map(|s| s.to_string()));
        Self { selectors }
    }

    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        self.selectors.iter().map(String::as_str)
    }

    /// First selector whose match set is non-empty.
    pub async fn evaluate(&self, page: &dyn PageSession, scope: Scope) -> CascadeMatch {
        self.evaluate_filtered(page, scope, &KeepAll, OnFilteredOut::Stop)
            .await
    }

    /// Like [`evaluate`](Self::evaluate), but each selector's matches pass
    /// through `filter` before counting as a hit.
    ///
    /// When the filter removes every match of a selector, `on_filtered_out`
    /// decides whether the cascade stops there (nothing found) or moves on
    /// to the next selector.
    pub async fn evaluate_filtered(
        &self,
        page: &dyn PageSession,
        scope: Scope,
        filter: &dyn MatchFilter,
        on_filtered_out: OnFilteredOut,
    ) -> CascadeMatch {
        for selector in self.selectors() {
            let candidates = match page.query_selector_all(scope, selector).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    debug!("Selector {} failed: {}", selector, e);
                    continue;
                }
            };

            if candidates.is_empty() {
                debug!("Selector {} matched nothing", selector);
                continue;
            }

            let total = candidates.len();
            let kept = filter.retain(page, candidates).await;
            if !kept.is_empty() {
                debug!("Selector {} matched {} of {} candidates", selector, kept.len(), total);
                return CascadeMatch::hit(kept, selector);
            }

            debug!("Selector {} matched {} candidates, all filtered out", selector, total);
            if on_filtered_out == OnFilteredOut::Stop {
                return CascadeMatch::miss();
            }
        }

        CascadeMatch::miss()
    }

    /// First selector whose first match has non-blank text; returns the
    /// trimmed text.
    pub async fn first_text(&self, page: &dyn PageSession, scope: Scope) -> Option<Hit<String>> {
        for selector in self.selectors() {
            let Ok(Some(element)) = page.query_selector(scope, selector).await else {
                continue;
            };
            if let Ok(Some(text)) = page.text_content(element).await {
                let text = text.trim();
                if !text.is_empty() {
                    return Some(Hit::new(text.to_string(), selector));
                }
            }
        }
        None
    }
}

/// A value found by a cascade, with the selector that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit<T> {
    pub value: T,
    pub selector: String,
}

impl<T> Hit<T> {
    fn new(value: T, selector: &str) -> Self {
        Self {
            value,
            selector: selector.to_string(),
        }
    }
}

/// Outcome of a cascade evaluation.
///
/// Either a non-empty match set with the selector that produced it, or an
/// empty set with no selector; never a mix.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CascadeMatch {
    matches: Vec<ElementHandle>,
    selector_used: Option<String>,
}

impl CascadeMatch {
    fn hit(matches: Vec<ElementHandle>, selector: &str) -> Self {
        Self {
            matches,
            selector_used: Some(selector.to_string()),
        }
    }

    fn miss() -> Self {
        Self::default()
    }

    pub fn matches(&self) -> &[ElementHandle] {
        &self.matches
    }

    pub fn selector_used(&self) -> Option<&str> {
        self.selector_used.as_deref()
    }

    /// Last match in document order.
    pub fn last(&self) -> Option<ElementHandle> {
        self.matches.last().copied()
    }

    pub fn into_parts(self) -> (Vec<ElementHandle>, Option<String>) {
        (self.matches, self.selector_used)
    }
}

/// Policy for a selector whose matches were all removed by the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFilteredOut {
    /// Treat the cascade as exhausted
    Stop,
    /// Try the next selector
    FallThrough,
}

/// Post-match filter applied to each selector's candidates.
#[async_trait(?Send)]
pub trait MatchFilter {
    async fn retain(
        &self,
        page: &dyn PageSession,
        candidates: Vec<ElementHandle>,
    ) -> Vec<ElementHandle>;
}

/// Filter that keeps every candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepAll;

#[async_trait(?Send)]
impl MatchFilter for KeepAll {
    async fn retain(
        &self,
        _page: &dyn PageSession,
        candidates: Vec<ElementHandle>,
    ) -> Vec<ElementHandle> {
        candidates
    }
}

/// Ordered `(selector, attribute)` probes; first non-empty value wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeCascade {
    probes: Vec<(String, String)>,
}

impl AttributeCascade {
    pub fn of(first: (&str, &str), rest: &[(&str, &str)]) -> Self {
        let probes = std::iter::once(&first)
            .chain(rest.iter())
            .map(|(selector, attribute)| (selector.to_string(), attribute.to_string()))
            .collect();
        Self { probes }
    }

    pub async fn first_value(&self, page: &dyn PageSession, scope: Scope) -> Option<Hit<String>> {
        for (selector, attribute) in &self.probes {
            let Ok(Some(element)) = page.query_selector(scope, selector).await else {
                continue;
            };
            if let Ok(Some(value)) = page.get_attribute(element, attribute).await {
                if !value.trim().is_empty() {
                    return Some(Hit::new(value, selector));
                }
            }
        }
        None
    }
}
