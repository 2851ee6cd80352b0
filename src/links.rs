//! Discovering and canonicalizing listing links

use tracing::debug;

use crate::browser::{ElementHandle, PageSession, Scope};
use crate::cascade::SelectorCascade;

/// Make `href` absolute against `origin`.
///
/// - `//host/path` takes the scheme of `origin`
/// - `/path` is prefixed with `origin`
/// - anything not starting with `http` is a bare identifier and becomes
///   `origin + subpath + href`
/// - full `http…` URLs are returned unchanged
pub fn normalize_href(href: &str, origin: &str, subpath: &str) -> String {
    let href = href.trim();
    let origin = origin.trim_end_matches('/');

    // Scheme-relative hrefs are checked before the `/` prefix rule
    if href.starts_with("//") {
        let scheme = origin.split("://").next().unwrap_or("https");
        format!("{}:{}", scheme, href)
    } else if href.starts_with('/') {
        format!("{}{}", origin, href)
    } else if !href.starts_with("http") {
        format!("{}{}{}", origin, subpath, href)
    } else {
        href.to_string()
    }
}

/// Finds the most relevant link in a card and makes it absolute.
#[derive(Debug, Clone)]
pub struct LinkNormalizer {
    origin: String,
    domain: String,
    subpath: String,
    anchors: SelectorCascade,
}

impl LinkNormalizer {
    pub fn new(
        origin: impl Into<String>,
        domain: impl Into<String>,
        subpath: impl Into<String>,
    ) -> Self {
        Self {
            origin: origin.into(),
            domain: domain.into(),
            subpath: subpath.into(),
            anchors: SelectorCascade::of(
                "a[href]",
                &["[href]", "[class*=\"link\"]", "[class*=\"card\"] a", "a"],
            ),
        }
    }

    pub fn normalize(&self, href: &str) -> String {
        normalize_href(href, &self.origin, &self.subpath)
    }

    /// Whether `href` points at a listing on the target site.
    pub fn is_relevant(&self, href: &str) -> bool {
        href.contains(&self.subpath) || (!self.domain.is_empty() && href.contains(&self.domain))
    }

    /// Absolute link for `card`, or an empty string when it has none.
    ///
    /// Search order: relevant hrefs under the direct-anchor selectors, then
    /// the first `a[href]` of any kind, then the card itself when it is an
    /// anchor, then the first anchor with a non-blank href.
    pub async fn find_link(&self, page: &dyn PageSession, card: ElementHandle) -> String {
        let scope = Scope::Element(card);

        for selector in self.anchors.selectors() {
            let Ok(candidates) = page.query_selector_all(scope, selector).await else {
                continue;
            };
            for candidate in candidates {
                if let Some(href) = href_of(page, candidate).await {
                    if self.is_relevant(&href) {
                        debug!("Link found with selector {}: {}", selector, href);
                        return self.normalize(&href);
                    }
                }
            }
        }

        if let Ok(Some(anchor)) = page.query_selector(scope, "a[href]").await {
            if let Some(href) = href_of(page, anchor).await {
                return self.normalize(&href);
            }
        }

        if let Ok(tag) = page.tag_name(card).await {
            if tag == "a" {
                if let Some(href) = href_of(page, card).await {
                    return self.normalize(&href);
                }
            }
        }

        if let Ok(anchors) = page.query_selector_all(scope, "a").await {
            for anchor in anchors {
                if let Some(href) = href_of(page, anchor).await {
                    return self.normalize(&href);
                }
            }
        }

        String::new()
    }
}

/// Non-blank `href` of an element.
async fn href_of(page: &dyn PageSession, element: ElementHandle) -> Option<String> {
    match page.get_attribute(element, "href").await {
        Ok(Some(href)) if !href.trim().is_empty() => Some(href),
        _ => None,
    }
}
