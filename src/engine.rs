//! Query pipeline: cache lookup, navigation, region, cards, fields
//!
//! Each top-level operation opens one page session and closes it on every
//! exit path. Failures after the cache check turn into an empty result
//! list plus a log line; only cache mutations report errors to callers.

use tracing::{debug, error, info, warn};

use crate::browser::{Browser, PageSession, Scope, WaitPolicy};
use crate::cache::QueryCache;
use crate::cards::{CardLocator, default_card_cascade};
use crate::config::ScoutConfig;
use crate::error::{BrowserError, ScoutError};
use crate::featured::FeaturedFilter;
use crate::fields::FieldExtractor;
use crate::links::LinkNormalizer;
use crate::record::{Query, ResultRecord};
use crate::region::RegionLocator;

/// An open page, closed explicitly on the normal path.
///
/// When the owning operation is cancelled mid-await the session is dropped
/// instead, which releases it.
struct OpenPage {
    session: Box<dyn PageSession>,
    closed: bool,
}

impl OpenPage {
    fn session(&mut self) -> &mut dyn PageSession {
        self.session.as_mut()
    }

    async fn close(mut self) {
        self.session.close().await;
        self.closed = true;
    }
}

impl Drop for OpenPage {
    fn drop(&mut self) {
        if !self.closed {
            warn!("Page session released without close");
        }
    }
}

/// Scrapes and caches directory listings.
pub struct Scout<B> {
    config: ScoutConfig,
    browser: B,
    cache: QueryCache,
    regions: RegionLocator,
    cards: CardLocator,
    fields: FieldExtractor,
}

impl<B: Browser> Scout<B> {
    pub fn new(config: ScoutConfig, browser: B) -> Result<Self, ScoutError> {
        let filter = FeaturedFilter::new(&config.featured_keywords);
        let links = LinkNormalizer::new(config.origin()?, config.domain()?, &config.link_subpath);

        Ok(Self {
            cache: QueryCache::new(&config.cache_dir),
            regions: RegionLocator::default(),
            cards: CardLocator::new(default_card_cascade(), filter.clone())
                .with_fallthrough(config.card_fallthrough),
            fields: FieldExtractor::new(links, filter, &config.source_label),
            config,
            browser,
        })
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Records for `query`, from the cache when present.
    pub async fn search(&self, query: &Query) -> Vec<ResultRecord> {
        info!("Searching MCP servers for '{}'", query);

        if let Some(records) = self.cache.get(query) {
            info!("Using cached results for '{}'", query);
            return records;
        }

        let Some(mut page) = self.open_page().await else {
            return Vec::new();
        };
        let url = self.config.search_url(query);
        let result = self.search_inner(page.session(), &url).await;
        page.close().await;

        let records = match result {
            Ok(Some(records)) => records,
            Ok(None) => return Vec::new(),
            Err(e) => {
                error!("Search for '{}' failed: {}", query, e);
                return Vec::new();
            }
        };

        if let Err(e) = self.cache.put(query, &records) {
            error!("Failed to cache results for '{}': {}", query, e);
        }
        info!("Found {} servers for '{}'", records.len(), query);
        records
    }

    /// Listings the directory features on its landing page.
    pub async fn featured(&self) -> Vec<ResultRecord> {
        info!("Fetching featured MCP servers");

        if let Some(records) = self.cache.get_featured() {
            info!("Using cached featured servers");
            return records;
        }

        let Some(mut page) = self.open_page().await else {
            return Vec::new();
        };
        let result = self.featured_inner(page.session()).await;
        page.close().await;

        let records = match result {
            Ok(Some(records)) => records,
            Ok(None) => return Vec::new(),
            Err(e) => {
                error!("Fetching featured servers failed: {}", e);
                return Vec::new();
            }
        };

        if let Err(e) = self.cache.put_featured(&records) {
            error!("Failed to cache featured servers: {}", e);
        }
        info!("Found {} featured servers", records.len());
        records
    }

    async fn open_page(&self) -> Option<OpenPage> {
        match self.browser.open().await {
            Ok(session) => Some(OpenPage {
                session,
                closed: false,
            }),
            Err(e) => {
                error!("Failed to open browser page: {}", e);
                None
            }
        }
    }

    /// Navigate with timeout, then give client-side rendering time to settle.
    async fn load(&self, page: &mut dyn PageSession, url: &str) -> Result<(), BrowserError> {
        info!("Navigating to {}", url);
        let timeout = self.config.navigation_timeout();
        tokio::time::timeout(timeout, page.navigate(url, WaitPolicy::NetworkIdle))
            .await
            .map_err(|_| BrowserError::Timeout {
                url: url.to_string(),
                secs: timeout.as_secs(),
            })??;
        page.wait_for_load_state(WaitPolicy::DomContentLoaded).await?;

        debug!("Waiting {:?} for results to render", self.config.settle_delay());
        tokio::time::sleep(self.config.settle_delay()).await;
        Ok(())
    }

    /// `Ok(None)` when the page has no organic cards; such outcomes are not cached.
    async fn search_inner(
        &self,
        page: &mut dyn PageSession,
        url: &str,
    ) -> Result<Option<Vec<ResultRecord>>, BrowserError> {
        self.load(page, url).await?;
        let page: &dyn PageSession = page;

        let region = self.regions.locate(page).await;
        let found = self.cards.locate_cards(page, region).await;
        let Some(selector) = found.selector_used else {
            self.log_page_diagnostics(page).await;
            return Ok(None);
        };

        let records = self.fields.extract_records(page, &found.cards, &selector).await;
        Ok(Some(records))
    }

    async fn featured_inner(
        &self,
        page: &mut dyn PageSession,
    ) -> Result<Option<Vec<ResultRecord>>, BrowserError> {
        self.load(page, &self.config.base_url).await?;
        let page: &dyn PageSession = page;

        let Some(section) = self.regions.locate_featured(page).await else {
            warn!("Featured section not found");
            return Ok(None);
        };
        Ok(Some(self.fields.extract_featured(page, section).await))
    }

    /// What the page looked like when no cards were found.
    async fn log_page_diagnostics(&self, page: &dyn PageSession) {
        if let Ok(html) = page.content().await {
            warn!("No result cards; page HTML is {} characters", html.len());
        }
        let marker = self.config.link_subpath.trim_matches('/');
        let selector = format!("a[href*=\"{}\"]", marker);
        if let Ok(links) = page.query_selector_all(Scope::Page, &selector).await {
            warn!("Found {} links with '{}' in href", links.len(), marker);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::ElementHandle;
    use crate::html_page::HtmlSession;
    use async_trait::async_trait;
    use std::cell::Cell;
    use std::rc::Rc;
    use tempfile::TempDir;

    const SEARCH_PAGE: &str = r#"
        <html><body>
          <main>
            <div class="featured">
              <div class="mcp-card"><h3>Postman</h3><p>API platform</p></div>
            </div>
            <div class="results">
              <div class="mcp-card">
                <img src="https://cdn.example.com/terminal.png">
                <h3>Terminal Controller</h3>
                <p>Run commands from chat</p>
                <a href="/mcp/terminal-controller">Open</a>
              </div>
              <div class="mcp-card"><div>Postman – API platform</div></div>
              <div class="mcp-card">
                <h3>Desktop Commander</h3>
                <p>Files and processes</p>
                <a href="desktop-commander">Open</a>
              </div>
            </div>
          </main>
        </body></html>
    "#;

    const LANDING_PAGE: &str = r#"
        <html><body>
          <section class="hero">
            <div><h2>Postman</h2><p>API platform</p><a href="/mcp/postman">Go</a></div>
            <div><h2>ByteRover</h2><p>Memory layer</p></div>
          </section>
        </body></html>
    "#;

    #[derive(Default)]
    struct Counters {
        navigations: Cell<usize>,
        closes: Cell<usize>,
        drops: Cell<usize>,
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Navigation {
        Serve,
        Fail,
        Hang,
    }

    /// Serves one fixed page and counts navigations, closes and drops.
    struct FixtureBrowser {
        html: String,
        navigation: Navigation,
        counters: Rc<Counters>,
    }

    impl FixtureBrowser {
        fn new(html: &str) -> Self {
            Self {
                html: html.to_string(),
                navigation: Navigation::Serve,
                counters: Rc::new(Counters::default()),
            }
        }

        fn failing() -> Self {
            Self {
                navigation: Navigation::Fail,
                ..Self::new("")
            }
        }

        fn hanging() -> Self {
            Self {
                navigation: Navigation::Hang,
                ..Self::new(SEARCH_PAGE)
            }
        }
    }

    struct FixturePage {
        inner: HtmlSession<String>,
        navigation: Navigation,
        counters: Rc<Counters>,
    }

    impl Drop for FixturePage {
        fn drop(&mut self) {
            self.counters.drops.set(self.counters.drops.get() + 1);
        }
    }

    #[async_trait(?Send)]
    impl Browser for FixtureBrowser {
        async fn open(&self) -> Result<Box<dyn PageSession>, BrowserError> {
            Ok(Box::new(FixturePage {
                inner: HtmlSession::new(self.html.clone()),
                navigation: self.navigation,
                counters: Rc::clone(&self.counters),
            }))
        }
    }

    #[async_trait(?Send)]
    impl PageSession for FixturePage {
        async fn navigate(&mut self, url: &str, wait: WaitPolicy) -> Result<(), BrowserError> {
            self.counters.navigations.set(self.counters.navigations.get() + 1);
            match self.navigation {
                Navigation::Serve => self.inner.navigate(url, wait).await,
                Navigation::Fail => Err(BrowserError::Navigation {
                    url: url.to_string(),
                    reason: "connection refused".to_string(),
                }),
                Navigation::Hang => std::future::pending().await,
            }
        }
        async fn query_selector(
            &self,
            scope: Scope,
            selector: &str,
        ) -> Result<Option<ElementHandle>, BrowserError> {
            self.inner.query_selector(scope, selector).await
        }
        async fn query_selector_all(
            &self,
            scope: Scope,
            selector: &str,
        ) -> Result<Vec<ElementHandle>, BrowserError> {
            self.inner.query_selector_all(scope, selector).await
        }
        async fn text_content(&self, handle: ElementHandle) -> Result<Option<String>, BrowserError> {
            self.inner.text_content(handle).await
        }
        async fn get_attribute(
            &self,
            handle: ElementHandle,
            name: &str,
        ) -> Result<Option<String>, BrowserError> {
            self.inner.get_attribute(handle, name).await
        }
        async fn tag_name(&self, handle: ElementHandle) -> Result<String, BrowserError> {
            self.inner.tag_name(handle).await
        }
        async fn content(&self) -> Result<String, BrowserError> {
            self.inner.content().await
        }
        async fn close(&mut self) {
            self.counters.closes.set(self.counters.closes.get() + 1);
            self.inner.close().await;
        }
    }

    fn config(dir: &TempDir) -> ScoutConfig {
        ScoutConfig::new()
            .with_base_url("https://example.com/mcp")
            .with_cache_dir(dir.path())
            .with_settle_delay_ms(0)
    }

    fn scout(dir: &TempDir, browser: FixtureBrowser) -> Scout<FixtureBrowser> {
        Scout::new(config(dir), browser).unwrap()
    }

    #[tokio::test]
    async fn test_search_then_cache_hit() {
        let dir = TempDir::new().unwrap();
        let browser = FixtureBrowser::new(SEARCH_PAGE);
        let counters = Rc::clone(&browser.counters);
        let scout = scout(&dir, browser);
        let query = Query::new("terminal").unwrap();

        let records = scout.search(&query).await;
        assert_eq!(counters.navigations.get(), 1);
        assert_eq!(counters.closes.get(), 1);

        let titles: Vec<_> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Terminal Controller", "Desktop Commander"]);
        assert_eq!(records[0].link, "https://example.com/mcp/terminal-controller");
        assert_eq!(records[0].icon, "https://cdn.example.com/terminal.png");
        assert_eq!(records[0].description, "Run commands from chat");
        assert_eq!(records[1].link, "https://example.com/mcp/desktop-commander");
        assert!(records.iter().all(|r| r.selector_used == ".mcp-card"));
        assert!(records.iter().all(|r| r.source == "cursor.directory"));

        assert_eq!(scout.cache().get(&query), Some(records.clone()));

        let again = scout.search(&query).await;
        assert_eq!(counters.navigations.get(), 1);
        assert_eq!(again, records);
    }

    #[tokio::test]
    async fn test_denylisted_cards_never_returned() {
        let dir = TempDir::new().unwrap();
        let scout = scout(&dir, FixtureBrowser::new(SEARCH_PAGE));

        let records = scout.search(&Query::new("api").unwrap()).await;
        assert!(!records.is_empty());
        assert!(
            records
                .iter()
                .all(|r| !r.title.to_lowercase().contains("postman"))
        );
    }

    #[tokio::test]
    async fn test_navigation_failure_returns_empty_and_closes() {
        let dir = TempDir::new().unwrap();
        let browser = FixtureBrowser::failing();
        let counters = Rc::clone(&browser.counters);
        let scout = scout(&dir, browser);
        let query = Query::new("terminal").unwrap();

        assert!(scout.search(&query).await.is_empty());
        assert_eq!(counters.closes.get(), 1);
        assert_eq!(scout.cache().get(&query), None);
    }

    #[tokio::test]
    async fn test_navigation_timeout_returns_empty_and_closes() {
        let dir = TempDir::new().unwrap();
        let browser = FixtureBrowser::hanging();
        let counters = Rc::clone(&browser.counters);
        let scout = Scout::new(config(&dir).with_navigation_timeout_secs(1), browser).unwrap();
        let query = Query::new("terminal").unwrap();

        let started = std::time::Instant::now();
        assert!(scout.search(&query).await.is_empty());
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
        assert_eq!(counters.navigations.get(), 1);
        assert_eq!(counters.closes.get(), 1);
        assert_eq!(scout.cache().get(&query), None);
    }

    #[tokio::test]
    async fn test_cancelled_search_releases_page() {
        let dir = TempDir::new().unwrap();
        let browser = FixtureBrowser::hanging();
        let counters = Rc::clone(&browser.counters);
        let scout = scout(&dir, browser);
        let query = Query::new("terminal").unwrap();

        let cancelled =
            tokio::time::timeout(std::time::Duration::from_millis(50), scout.search(&query)).await;
        assert!(cancelled.is_err());
        assert_eq!(counters.closes.get(), 0);
        assert_eq!(counters.drops.get(), 1);
        assert_eq!(scout.cache().get(&query), None);
    }

    #[tokio::test]
    async fn test_no_cards_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let browser = FixtureBrowser::new("<html><body><p>No results</p></body></html>");
        let counters = Rc::clone(&browser.counters);
        let scout = scout(&dir, browser);
        let query = Query::new("nothing").unwrap();

        assert!(scout.search(&query).await.is_empty());
        assert_eq!(scout.cache().get(&query), None);

        scout.search(&query).await;
        assert_eq!(counters.navigations.get(), 2);
        assert_eq!(counters.closes.get(), 2);
    }

    #[tokio::test]
    async fn test_featured_fetch_and_cache() {
        let dir = TempDir::new().unwrap();
        let browser = FixtureBrowser::new(LANDING_PAGE);
        let counters = Rc::clone(&browser.counters);
        let scout = scout(&dir, browser);

        let featured = scout.featured().await;
        let titles: Vec<_> = featured.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Postman", "ByteRover"]);
        assert!(featured.iter().all(|r| r.featured));
        assert_eq!(featured[0].link, "https://example.com/mcp/postman");

        assert_eq!(scout.featured().await, featured);
        assert_eq!(counters.navigations.get(), 1);
        assert!(scout.cache().list_queries().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_featured_section_missing() {
        let dir = TempDir::new().unwrap();
        let scout = scout(&dir, FixtureBrowser::new("<p>plain</p>"));
        assert!(scout.featured().await.is_empty());
        assert_eq!(scout.cache().get_featured(), None);
    }
}
