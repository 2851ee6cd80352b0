//! Static HTML browser backend
//!
//! Implements the browser capability on top of a plain HTTP fetch and a
//! `scraper` DOM. Pages are not executed, so client-rendered content only
//! shows up when the server pre-renders it; for the directory this tool
//! targets, the server-side render carries the result cards.
//!
//! Element handles are indexes into the document-order list of elements of
//! the currently loaded page. The list and its reverse map are built once
//! per load.

use async_trait::async_trait;
use ego_tree::NodeId;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::browser::{Browser, ElementHandle, PageSession, Scope, WaitPolicy};
use crate::config::ScoutConfig;
use crate::error::BrowserError;

/// Where a session gets the HTML for a URL.
#[async_trait(?Send)]
pub trait PageSource {
    async fn fetch(&self, url: &str) -> Result<String, BrowserError>;
}

/// A fixed document served for every URL.
#[async_trait(?Send)]
impl PageSource for String {
    async fn fetch(&self, _url: &str) -> Result<String, BrowserError> {
        Ok(self.clone())
    }
}

/// Fetches pages over HTTP with a shared client.
#[derive(Clone)]
pub struct HttpSource {
    client: Client,
}

#[async_trait(?Send)]
impl PageSource for HttpSource {
    async fn fetch(&self, url: &str) -> Result<String, BrowserError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml")
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        Ok(response.text().await?)
    }
}

/// Browser that opens [`HtmlSession`]s backed by HTTP.
pub struct HttpBrowser {
    source: HttpSource,
}

impl HttpBrowser {
    /// Build the HTTP client for this run.
    pub fn new(config: &ScoutConfig) -> Result<Self, BrowserError> {
        let client = Client::builder()
            // Timeouts
            .connect_timeout(Duration::from_secs(5))
            .timeout(config.navigation_timeout())
            // Compression
            .gzip(true)
            .brotli(true)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            source: HttpSource { client },
        })
    }
}

#[async_trait(?Send)]
impl Browser for HttpBrowser {
    async fn open(&self) -> Result<Box<dyn PageSession>, BrowserError> {
        Ok(Box::new(HtmlSession::new(self.source.clone())))
    }
}

/// A parsed page plus a document-order index of its elements.
struct LoadedPage {
    html: Html,
    order: Vec<NodeId>,
    index: HashMap<NodeId, usize>,
}

impl LoadedPage {
    fn parse(source: &str) -> Self {
        let html = Html::parse_document(source);
        let order: Vec<NodeId> = html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .map(|el| el.id())
            .collect();
        let index = order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        Self { html, order, index }
    }

    fn resolve(&self, handle: ElementHandle) -> Result<ElementRef<'_>, BrowserError> {
        self.order
            .get(handle.0)
            .and_then(|id| self.html.tree.get(*id))
            .and_then(ElementRef::wrap)
            .ok_or(BrowserError::StaleHandle(handle.0))
    }

    fn handle(&self, el: ElementRef<'_>) -> Option<ElementHandle> {
        self.index.get(&el.id()).copied().map(ElementHandle)
    }
}

fn parse_selector(selector: &str) -> Result<Selector, BrowserError> {
    Selector::parse(selector).map_err(|e| BrowserError::InvalidSelector {
        selector: selector.to_string(),
        reason: format!("{:?}", e),
    })
}

/// A page session holding one parsed document at a time.
pub struct HtmlSession<S> {
    source: S,
    page: Option<LoadedPage>,
}

impl<S: PageSource> HtmlSession<S> {
    pub fn new(source: S) -> Self {
        Self { source, page: None }
    }

    fn loaded(&self) -> Result<&LoadedPage, BrowserError> {
        self.page.as_ref().ok_or(BrowserError::NotNavigated)
    }
}

#[cfg(test)]
impl HtmlSession<String> {
    /// Session with `html` already loaded; navigation re-serves the same page.
    pub fn from_html(html: &str) -> Self {
        Self {
            source: html.to_string(),
            page: Some(LoadedPage::parse(html)),
        }
    }
}

#[async_trait(?Send)]
impl<S: PageSource> PageSession for HtmlSession<S> {
    async fn navigate(&mut self, url: &str, wait: WaitPolicy) -> Result<(), BrowserError> {
        debug!("Loading {} ({:?})", url, wait);
        let html = self.source.fetch(url).await?;
        self.page = Some(LoadedPage::parse(&html));
        Ok(())
    }

    /// The document is fully parsed once `navigate` returns.
    async fn wait_for_load_state(&self, _state: WaitPolicy) -> Result<(), BrowserError> {
        self.loaded().map(|_| ())
    }

    async fn query_selector(
        &self,
        scope: Scope,
        selector: &str,
    ) -> Result<Option<ElementHandle>, BrowserError> {
        let page = self.loaded()?;
        let parsed = parse_selector(selector)?;
        let first = match scope {
            Scope::Page => page.html.select(&parsed).next(),
            Scope::Element(handle) => page.resolve(handle)?.select(&parsed).next(),
        };
        Ok(first.and_then(|el| page.handle(el)))
    }

    async fn query_selector_all(
        &self,
        scope: Scope,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, BrowserError> {
        let page = self.loaded()?;
        let parsed = parse_selector(selector)?;
        Ok(match scope {
            Scope::Page => page
                .html
                .select(&parsed)
                .filter_map(|el| page.handle(el))
                .collect(),
            Scope::Element(handle) => page
                .resolve(handle)?
                .select(&parsed)
                .filter_map(|el| page.handle(el))
                .collect(),
        })
    }

    async fn text_content(&self, handle: ElementHandle) -> Result<Option<String>, BrowserError> {
        let el = self.loaded()?.resolve(handle)?;
        Ok(Some(el.text().collect()))
    }

    async fn get_attribute(
        &self,
        handle: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        let el = self.loaded()?.resolve(handle)?;
        Ok(el.value().attr(name).map(str::to_string))
    }

    async fn tag_name(&self, handle: ElementHandle) -> Result<String, BrowserError> {
        let el = self.loaded()?.resolve(handle)?;
        Ok(el.value().name().to_ascii_lowercase())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        Ok(self.loaded()?.html.html())
    }

    async fn close(&mut self) {
        self.page = None;
    }
}
