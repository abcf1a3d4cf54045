//! The narrow slice of browser automation the scraper actually needs.
//!
//! Harvesting and extraction are written against [`Page`] only, so they run
//! the same way over a live WebDriver session and over static HTML.

use anyhow::Result;
use async_trait::async_trait;

pub mod html;
pub mod webdriver;

pub use html::{HtmlBrowser, HtmlPage};
pub use webdriver::{ChromeBrowser, ChromeOptions, WebDriverPage};

#[async_trait]
pub trait Page: Send + Sync {
    type Element: Send + Sync;

    async fn navigate(&self, url: &str) -> Result<()>;

    async fn scroll_to_bottom(&self) -> Result<()>;

    async fn page_height(&self) -> Result<u64>;

    /// All matches of `selector` in the whole document, in document order.
    async fn find_all(&self, selector: &str) -> Result<Vec<Self::Element>>;

    /// First descendant of `within` matching `selector`.
    async fn find_first(
        &self,
        within: &Self::Element,
        selector: &str,
    ) -> Result<Option<Self::Element>>;

    async fn attribute(&self, element: &Self::Element, name: &str) -> Result<Option<String>>;

    async fn text(&self, element: &Self::Element) -> Result<String>;
}

/// Hands out one page per scraping session and tears it down afterwards.
#[async_trait]
pub trait Browser: Send + Sync {
    type Page: Page + 'static;

    async fn open(&self) -> Result<Self::Page>;

    async fn close(&self, page: Self::Page) -> Result<()>;
}
