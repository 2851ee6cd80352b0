//! Locating the page regions that hold organic and featured listings

use tracing::{debug, info};

use crate::browser::{ElementHandle, PageSession, Scope};
use crate::cascade::SelectorCascade;

/// Finds the results container and the featured section of a page.
#[derive(Debug, Clone)]
pub struct RegionLocator {
    results: SelectorCascade,
    featured: SelectorCascade,
}

impl Default for RegionLocator {
    fn default() -> Self {
        Self {
            // Everything except the leading (featured) block
            results: SelectorCascade::of(
                "main > div:not(:first-child)",
                &[
                    "[class*=\"grid\"]:not(:first-child)",
                    "[class*=\"results\"]",
                    "[class*=\"search\"]",
                    "section:not(:first-child)",
                    "div[class*=\"container\"] > div:not(:first-child)",
                ],
            ),
            featured: SelectorCascade::of(
                "[data-testid=\"featured-mcp\"]",
                &[
                    ".featured",
                    "[class*=\"featured\"]",
                    "[class*=\"hero\"]",
                    ".hero",
                    "section",
                ],
            ),
        }
    }
}

impl RegionLocator {
    /// Region believed to hold query results, or the whole page.
    ///
    /// Results tend to follow promotional blocks, so when the winning
    /// selector matches several elements the last one is used.
    pub async fn locate(&self, page: &dyn PageSession) -> Scope {
        let found = self.results.evaluate(page, Scope::Page).await;
        match (found.last(), found.selector_used()) {
            (Some(region), Some(selector)) => {
                info!("Results region found with selector: {}", selector);
                Scope::Element(region)
            }
            _ => {
                debug!("No separate results region, searching the whole page");
                Scope::Page
            }
        }
    }

    /// First element of the first matching featured-section selector.
    pub async fn locate_featured(&self, page: &dyn PageSession) -> Option<ElementHandle> {
        let found = self.featured.evaluate(page, Scope::Page).await;
        let section = found.matches().first().copied()?;
        info!(
            "Featured section found with selector: {}",
            found.selector_used().unwrap_or_default()
        );
        Some(section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html_page::HtmlSession;

    #[tokio::test]
    async fn test_picks_last_non_first_block() {
        let page = HtmlSession::from_html(
            r#"<main>
                 <div id="featured">Featured</div>
                 <div id="filters">Filters</div>
                 <div id="results">Results</div>
               </main>"#,
        );
        let scope = RegionLocator::default().locate(&page).await;

        let Scope::Element(region) = scope else {
            panic!("expected a region, got {:?}", scope);
        };
        assert_eq!(
            page.get_attribute(region, "id").await.unwrap().as_deref(),
            Some("results")
        );
    }

    #[tokio::test]
    async fn test_falls_back_to_later_selectors() {
        let page = HtmlSession::from_html(
            r#"<div class="search-results"><article>One</article></div>"#,
        );
        let scope = RegionLocator::default().locate(&page).await;
        assert!(matches!(scope, Scope::Element(_)));
    }

    #[tokio::test]
    async fn test_whole_page_when_nothing_matches() {
        let page = HtmlSession::from_html(r#"<ul><li>One</li><li>Two</li></ul>"#);
        assert_eq!(RegionLocator::default().locate(&page).await, Scope::Page);
    }

    #[tokio::test]
    async fn test_featured_section_is_first_match() {
        let page = HtmlSession::from_html(
            r#"<section id="a">Hero</section><section id="b">Other</section>"#,
        );
        let locator = RegionLocator::default();
        let section = locator.locate_featured(&page).await.unwrap();
        assert_eq!(
            page.get_attribute(section, "id").await.unwrap().as_deref(),
            Some("a")
        );

        let empty = HtmlSession::from_html("<p>nothing</p>");
        assert!(locator.locate_featured(&empty).await.is_none());
    }
}
