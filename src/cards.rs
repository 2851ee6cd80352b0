//! Enumerating result cards inside a region

use tracing::{info, warn};

use crate::browser::{ElementHandle, PageSession, Scope};
use crate::cascade::{OnFilteredOut, SelectorCascade};
use crate::featured::FeaturedFilter;

/// Cards located in a region, with the selector that found them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardSet {
    pub cards: Vec<ElementHandle>,
    pub selector_used: Option<String>,
}

/// Finds item-like elements and drops promoted ones.
#[derive(Debug, Clone)]
pub struct CardLocator {
    cascade: SelectorCascade,
    filter: FeaturedFilter,
    on_filtered_out: OnFilteredOut,
}

/// Generic "item-like" selectors, most specific first.
pub fn default_card_cascade() -> SelectorCascade {
    SelectorCascade::of(
        "[data-testid=\"mcp-card\"]",
        &[
            ".mcp-card",
            "[class*=\"card\"]",
            "[class*=\"mcp\"]",
            "article",
            ".grid > div",
            "[role=\"article\"]",
            "a[href*=\"/mcp/\"]",
            "div[class*=\"item\"]",
            "div[class*=\"server\"]",
        ],
    )
}

impl CardLocator {
    pub fn new(cascade: SelectorCascade, filter: FeaturedFilter) -> Self {
        Self {
            cascade,
            filter,
            on_filtered_out: OnFilteredOut::Stop,
        }
    }

    /// Keep searching later selectors when every card of a selector is
    /// promoted content.
    #[must_use]
    pub fn with_fallthrough(mut self, enabled: bool) -> Self {
        self.on_filtered_out = if enabled {
            OnFilteredOut::FallThrough
        } else {
            OnFilteredOut::Stop
        };
        self
    }

    /// Organic cards in `scope`. Empty means "no organic results".
    pub async fn locate_cards(&self, page: &dyn PageSession, scope: Scope) -> CardSet {
        let found = self
            .cascade
            .evaluate_filtered(page, scope, &self.filter, self.on_filtered_out)
            .await;

        let (cards, selector_used) = found.into_parts();
        match &selector_used {
            Some(selector) => {
                info!("Found {} result cards with selector: {}", cards.len(), selector)
            }
            None => warn!("No result cards found"),
        }
        CardSet {
            cards,
            selector_used,
        }
    }
}
