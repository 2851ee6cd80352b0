//! Per-card field extraction
//!
//! Every field runs its own cascade scoped to the card. When no title can
//! be found structurally, the card's raw text is split into lines: the
//! first line becomes the title and the next one or two the description.

use std::collections::HashSet;
use tracing::{debug, info};

use crate::browser::{ElementHandle, PageSession, Scope};
use crate::cascade::{AttributeCascade, SelectorCascade};
use crate::featured::FeaturedFilter;
use crate::links::LinkNormalizer;
use crate::record::ResultRecord;

/// Raw fields pulled out of one card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardFields {
    pub title: String,
    pub description: String,
    pub link: String,
    pub icon: String,
}

/// Split raw card text into a title line and up to two description lines.
pub fn split_text_fallback(text: &str) -> Option<(String, String)> {
    let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());
    let title = lines.next()?.to_string();
    let description = lines.take(2).collect::<Vec<_>>().join(" ");
    Some((title, description))
}

/// Cascades for each field of a result card.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    title: SelectorCascade,
    description: SelectorCascade,
    icon: AttributeCascade,
    featured_title: SelectorCascade,
    featured_description: SelectorCascade,
    links: LinkNormalizer,
    filter: FeaturedFilter,
    source_label: String,
}

impl FieldExtractor {
    pub fn new(links: LinkNormalizer, filter: FeaturedFilter, source_label: impl Into<String>) -> Self {
        Self {
            title: SelectorCascade::of(
                "[data-testid=\"mcp-title\"]",
                &[
                    ".title",
                    "h3",
                    "h2",
                    "h1",
                    "[class*=\"title\"]",
                    "strong",
                    "b",
                    "a",
                    "[class*=\"name\"]",
                ],
            ),
            description: SelectorCascade::of(
                "[data-testid=\"mcp-description\"]",
                &[
                    ".description",
                    "p",
                    "[class*=\"desc\"]",
                    "[class*=\"summary\"]",
                    "[class*=\"text\"]",
                    "span",
                ],
            ),
            icon: AttributeCascade::of(
                ("img", "src"),
                &[("[src]", "src"), ("[class*=\"icon\"]", "src")],
            ),
            featured_title: SelectorCascade::of("h1", &["h2", "h3", "strong", "b"]),
            featured_description: SelectorCascade::of("p", &["span"]),
            links,
            filter,
            source_label: source_label.into(),
        }
    }

    /// Extract title, description, link and icon from `card`.
    pub async fn extract_fields(&self, page: &dyn PageSession, card: ElementHandle) -> CardFields {
        let scope = Scope::Element(card);

        let mut title = match self.title.first_text(page, scope).await {
            Some(hit) => {
                debug!("Card {} title via {}", card, hit.selector);
                hit.value
            }
            None => String::new(),
        };
        let mut description = self
            .description
            .first_text(page, scope)
            .await
            .map(|hit| hit.value)
            .unwrap_or_default();
        let link = self.links.find_link(page, card).await;
        let icon = self
            .icon
            .first_value(page, scope)
            .await
            .map(|hit| hit.value)
            .unwrap_or_default();

        if title.is_empty() {
            if let Ok(Some(text)) = page.text_content(card).await {
                if let Some((fallback_title, fallback_description)) = split_text_fallback(&text) {
                    debug!("Card {} title taken from raw text", card);
                    title = fallback_title;
                    description = fallback_description;
                }
            }
        }

        CardFields {
            title,
            description,
            link,
            icon,
        }
    }

    /// Build records for `cards`, dropping those whose title is featured.
    pub async fn extract_records(
        &self,
        page: &dyn PageSession,
        cards: &[ElementHandle],
        selector_used: &str,
    ) -> Vec<ResultRecord> {
        info!("Extracting data from {} cards", cards.len());
        let mut records = Vec::with_capacity(cards.len());

        for (i, card) in cards.iter().enumerate() {
            let fields = self.extract_fields(page, *card).await;

            if let Some(keyword) = self.filter.matched_keyword(&fields.title) {
                info!("Skipping featured server: {} ('{}')", fields.title, keyword);
                continue;
            }

            let record = ResultRecord::new(
                &fields.title,
                &fields.description,
                fields.link,
                fields.icon,
                &self.source_label,
                selector_used,
            );
            debug!("Card {}/{}: {} {}", i + 1, cards.len(), record.title, record.link);
            records.push(record);
        }

        records
    }

    /// Records for every titled element inside a featured section.
    ///
    /// The section is walked element by element, so nested wrappers of the
    /// same listing produce the same title and link; those repeats are
    /// dropped.
    pub async fn extract_featured(
        &self,
        page: &dyn PageSession,
        section: ElementHandle,
    ) -> Vec<ResultRecord> {
        let Ok(elements) = page.query_selector_all(Scope::Element(section), "*").await else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for element in elements {
            let scope = Scope::Element(element);
            let Some(title) = self.featured_title.first_text(page, scope).await else {
                continue;
            };
            let description = self
                .featured_description
                .first_text(page, scope)
                .await
                .map(|hit| hit.value)
                .unwrap_or_default();
            let link = match page.query_selector(scope, "a").await {
                Ok(Some(anchor)) => match page.get_attribute(anchor, "href").await {
                    Ok(Some(href)) if !href.trim().is_empty() => self.links.normalize(&href),
                    _ => String::new(),
                },
                _ => String::new(),
            };

            if !seen.insert((title.value.clone(), link.clone())) {
                continue;
            }

            records.push(
                ResultRecord::new(
                    &title.value,
                    &description,
                    link,
                    String::new(),
                    &self.source_label,
                    "",
                )
                .into_featured(),
            );
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_featured_keywords;
    use crate::html_page::HtmlSession;
    use crate::record::UNKNOWN_TITLE;

    fn extractor() -> FieldExtractor {
        FieldExtractor::new(
            LinkNormalizer::new("https://cursor.directory", "cursor.directory", "/mcp/"),
            FeaturedFilter::new(default_featured_keywords()),
            "cursor.directory",
        )
    }

    async fn cards(page: &HtmlSession<String>) -> Vec<ElementHandle> {
        page.query_selector_all(Scope::Page, ".card").await.unwrap()
    }

    #[test]
    fn test_split_text_fallback() {
        let (title, description) =
            split_text_fallback("\n   Terminal  \n\n  Run commands\n  from chat \n  extra\n").unwrap();
        assert_eq!(title, "Terminal");
        assert_eq!(description, "Run commands from chat");

        let (title, description) = split_text_fallback("Solo").unwrap();
        assert_eq!(title, "Solo");
        assert_eq!(description, "");

        assert!(split_text_fallback(" \n \n").is_none());
    }

    #[tokio::test]
    async fn test_structured_fields() {
        let page = HtmlSession::from_html(
            r#"<div class="card">
                 <img src="https://cdn.example.com/t.png">
                 <h3>Terminal Controller</h3>
                 <p>Run shell commands</p>
                 <a href="/mcp/terminal-controller">Open</a>
               </div>"#,
        );
        let card = cards(&page).await[0];
        let fields = extractor().extract_fields(&page, card).await;

        assert_eq!(
            fields,
            CardFields {
                title: "Terminal Controller".to_string(),
                description: "Run shell commands".to_string(),
                link: "https://cursor.directory/mcp/terminal-controller".to_string(),
                icon: "https://cdn.example.com/t.png".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_raw_text_fallback() {
        let page = HtmlSession::from_html(
            "<div class=\"card\"><div>Desktop Commander\nEdit files\nRun processes\nMore</div></div>",
        );
        let card = cards(&page).await[0];
        let fields = extractor().extract_fields(&page, card).await;

        assert_eq!(fields.title, "Desktop Commander");
        assert_eq!(fields.description, "Edit files Run processes");
        assert_eq!(fields.link, "");
        assert_eq!(fields.icon, "");
    }

    #[tokio::test]
    async fn test_featured_title_is_dropped_late() {
        let page = HtmlSession::from_html(
            r#"<div class="card"><div>Postman – API platform</div></div>
               <div class="card"><h3>Terminal</h3></div>"#,
        );
        let cards = cards(&page).await;
        let records = extractor().extract_records(&page, &cards, ".card").await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Terminal");
        assert_eq!(records[0].selector_used, ".card");
        assert_eq!(records[0].source, "cursor.directory");
    }

    #[tokio::test]
    async fn test_empty_card_gets_sentinel_title() {
        let page = HtmlSession::from_html(r#"<div class="card"><img src="/x.png"></div>"#);
        let cards = cards(&page).await;
        let records = extractor().extract_records(&page, &cards, ".card").await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, UNKNOWN_TITLE);
        assert_eq!(records[0].icon, "/x.png");
    }

    #[tokio::test]
    async fn test_featured_section_records() {
        let page = HtmlSession::from_html(
            r#"<section class="hero">
                 <div class="pick">
                   <h2>Postman</h2><p>API platform</p><a href="/mcp/postman">Go</a>
                 </div>
                 <div class="pick">
                   <h2>ByteRover</h2><span>Memory layer</span>
                 </div>
               </section>"#,
        );
        let section = page
            .query_selector(Scope::Page, "section")
            .await
            .unwrap()
            .unwrap();
        let records = extractor().extract_featured(&page, section).await;

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.featured));
        assert_eq!(records[0].title, "Postman");
        assert_eq!(records[0].description, "API platform");
        assert_eq!(records[0].link, "https://cursor.directory/mcp/postman");
        assert_eq!(records[1].title, "ByteRover");
        assert_eq!(records[1].link, "");
    }
}
