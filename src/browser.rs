//! Browser capability consumed by the extraction pipeline
//!
//! The pipeline never touches a DOM directly. It asks a [`PageSession`] to
//! run selectors against a [`Scope`] and to read text and attributes from
//! the returned [`ElementHandle`]s. Every call is fallible; callers decide
//! whether a failure matters (it almost never does).
//!
//! Sessions are `?Send`: one session belongs to one pipeline and is driven
//! cooperatively on the current task.

use async_trait::async_trait;
use std::fmt;

use crate::error::BrowserError;

/// Opaque reference to a located element.
///
/// Only meaningful for the session (and page load) that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub(crate) usize);

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a selector is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The whole document
    Page,
    /// Descendants of one element
    Element(ElementHandle),
}

/// How long navigation waits before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitPolicy {
    /// Return once the DOM is parsed
    DomContentLoaded,
    /// Return once the network has gone quiet
    #[default]
    NetworkIdle,
}

/// Factory for page sessions.
#[async_trait(?Send)]
pub trait Browser {
    /// Open a fresh page. The caller must [`PageSession::close`] it.
    async fn open(&self) -> Result<Box<dyn PageSession>, BrowserError>;
}

/// One open page (tab).
#[async_trait(?Send)]
pub trait PageSession {
    /// Load `url` into this page, replacing any previous document.
    async fn navigate(&mut self, url: &str, wait: WaitPolicy) -> Result<(), BrowserError>;

    /// Wait until the current page reaches `state`.
    async fn wait_for_load_state(&self, _state: WaitPolicy) -> Result<(), BrowserError> {
        Ok(())
    }

    /// First element matching `selector` inside `scope`.
    async fn query_selector(
        &self,
        scope: Scope,
        selector: &str,
    ) -> Result<Option<ElementHandle>, BrowserError>;

    /// All elements matching `selector` inside `scope`, in document order.
    async fn query_selector_all(
        &self,
        scope: Scope,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, BrowserError>;

    /// Full text content of an element, including descendants.
    async fn text_content(&self, handle: ElementHandle) -> Result<Option<String>, BrowserError>;

    async fn get_attribute(
        &self,
        handle: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BrowserError>;

    /// Lowercase tag name of an element.
    async fn tag_name(&self, handle: ElementHandle) -> Result<String, BrowserError>;

    /// Serialized HTML of the current document.
    async fn content(&self) -> Result<String, BrowserError>;

    /// Release the page. Dropping a session without closing it must
    /// release it as well.
    async fn close(&mut self);
}
