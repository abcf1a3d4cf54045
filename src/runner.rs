use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::time::sleep;
use tracing::warn;
use url::Url;

use crate::extract::{SelectorSet, extract};
use crate::harvest::harvest;
use crate::model::{QueryConfig, ResultTable, SessionOutcome};
use crate::page::{Browser, Page};
use crate::progress::Reporter;

pub const DEFAULT_MARKETPLACE_URL: &str = "https://www.facebook.com/marketplace/category/search/";

// -------------------------
// Target url
// -------------------------

#[derive(Debug, Clone)]
pub struct SearchTarget {
    base: Url,
}

impl SearchTarget {
    pub fn new(base: &str) -> Result<Self> {
        let base = Url::parse(base).with_context(|| format!("invalid marketplace url {base:?}"))?;
        Ok(Self { base })
    }

    pub fn url_for(&self, config: &QueryConfig) -> Url {
        let mut u = self.base.clone();
        u.query_pairs_mut()
            .clear()
            .append_pair("query", config.product())
            .append_pair("exact", if config.match_exact() { "true" } else { "false" })
            .append_pair("minPrice", &config.min_price().to_string())
            .append_pair("maxPrice", &config.max_price().to_string())
            .append_pair("region_id", config.region_code());
        u
    }
}

impl Default for SearchTarget {
    fn default() -> Self {
        Self {
            base: Url::parse(DEFAULT_MARKETPLACE_URL).expect("constant url"),
        }
    }
}

// -------------------------
// Session runner
// -------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub initial_load: Duration,
    pub scroll_settle: Duration,
    pub max_scrolls: usize,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            initial_load: Duration::from_secs(15),
            scroll_settle: Duration::from_secs(5),
            max_scrolls: 5,
        }
    }
}

impl Timings {
    pub fn instant(max_scrolls: usize) -> Self {
        Self {
            initial_load: Duration::ZERO,
            scroll_settle: Duration::ZERO,
            max_scrolls,
        }
    }
}

/// One config in, rows out. Object safe so the batch loop and the web layer
/// do not care which browser backs it.
#[async_trait]
pub trait Scrape: Send + Sync {
    async fn scrape(&self, config: &QueryConfig, reporter: &Reporter) -> Result<SessionOutcome>;
}

pub struct SessionRunner<B> {
    browser: Arc<B>,
    target: SearchTarget,
    selectors: SelectorSet,
    timings: Timings,
}

/// An open page that gets closed even if the session future is dropped
/// halfway through. `close` is the normal path; `Drop` hands the page to a
/// background task on the current runtime.
struct OpenPage<B: Browser + 'static> {
    browser: Arc<B>,
    page: Option<B::Page>,
}

impl<B: Browser + 'static> OpenPage<B> {
    fn page(&self) -> Option<&B::Page> {
        self.page.as_ref()
    }

    async fn close(mut self) -> Result<()> {
        match self.page.take() {
            Some(page) => self.browser.close(page).await,
            None => Ok(()),
        }
    }
}

impl<B: Browser + 'static> Drop for OpenPage<B> {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };
        warn!("session cancelled, closing browser in the background");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let browser = Arc::clone(&self.browser);
                handle.spawn(async move {
                    if let Err(e) = browser.close(page).await {
                        warn!("could not close browser properly: {e:#}");
                    }
                });
            }
            Err(_) => warn!("no runtime left to close the browser on"),
        }
    }
}

impl<B: Browser + 'static> SessionRunner<B> {
    pub fn new(browser: B, target: SearchTarget, selectors: SelectorSet, timings: Timings) -> Self {
        Self {
            browser: Arc::new(browser),
            target,
            selectors,
            timings,
        }
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    /// Opens a fresh page, scrapes, and closes the page on every path,
    /// cancellation included. Any failure along the way becomes an empty
    /// outcome.
    pub async fn run(&self, config: &QueryConfig, reporter: &Reporter) -> SessionOutcome {
        let page = match self.browser.open().await {
            Ok(p) => p,
            Err(e) => {
                warn!(city = config.city(), "browser failed to start: {e:#}");
                reporter.status(format!("Error during scraping: {e:#}"));
                return SessionOutcome::empty();
            }
        };
        reporter.status("Browser initialized successfully");
        let session = OpenPage {
            browser: Arc::clone(&self.browser),
            page: Some(page),
        };

        let scraped = match session.page() {
            Some(page) => self.scrape_page(page, config, reporter).await,
            None => Ok(SessionOutcome::empty()),
        };
        let outcome = match scraped {
            Ok(o) => o,
            Err(e) => {
                warn!(city = config.city(), "scrape failed: {e:#}");
                reporter.status(format!("Error during scraping: {e:#}"));
                SessionOutcome::empty()
            }
        };

        match session.close().await {
            Ok(()) => reporter.status("Browser closed successfully"),
            Err(e) => {
                warn!("could not close browser properly: {e:#}");
                reporter.status("Could not close browser properly");
            }
        }
        outcome
    }

    async fn scrape_page(
        &self,
        page: &B::Page,
        config: &QueryConfig,
        reporter: &Reporter,
    ) -> Result<SessionOutcome> {
        let url = self.target.url_for(config);
        reporter.status(format!("Attempting to access URL: {url}"));
        page.navigate(url.as_str()).await?;
        sleep(self.timings.initial_load).await;
        reporter.status("Page loaded, checking for elements...");

        let cards = harvest(
            page,
            &self.selectors.containers,
            self.timings.max_scrolls,
            self.timings.scroll_settle,
            reporter,
        )
        .await?;

        let rows = extract_rows(page, &cards, &self.selectors, &url, config.city(), reporter).await;
        reporter.status(format!("Successfully extracted {} items", rows.len()));
        Ok(SessionOutcome {
            rows,
            raw_item_count: cards.len(),
        })
    }
}

/// Extracts every card in order, keeping only usable ones.
pub async fn extract_rows<P: Page>(
    page: &P,
    cards: &[P::Element],
    selectors: &SelectorSet,
    base: &Url,
    location: &str,
    reporter: &Reporter,
) -> ResultTable {
    let mut rows = ResultTable::new();
    for card in cards {
        if let Some(fields) = extract(page, card, selectors, Some(base)).await {
            reporter.status(format!(
                "Found item: {} - {}",
                fields.title,
                fields.price_raw.as_deref().unwrap_or("no price")
            ));
            rows.push(fields.into_record(location));
        }
    }
    rows
}

#[async_trait]
impl<B: Browser + 'static> Scrape for SessionRunner<B> {
    async fn scrape(&self, config: &QueryConfig, reporter: &Reporter) -> Result<SessionOutcome> {
        Ok(self.run(config, reporter).await)
    }
}
