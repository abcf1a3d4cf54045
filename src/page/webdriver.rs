use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use rand::{Rng, rng};
use serde::Deserialize;
use std::time::Duration;
use thirtyfour::prelude::*;
use tracing::info;

use super::{Browser, Page};

// -------------------------
// Chrome over WebDriver
// -------------------------

#[derive(Debug, Clone)]
pub struct ChromeOptions {
    /// WebDriver server, e.g. a local chromedriver.
    pub webdriver_url: String,
    pub headless: bool,
}

impl Default for ChromeOptions {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: false,
        }
    }
}

pub struct ChromeBrowser {
    options: ChromeOptions,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct StatusReply {
    value: StatusValue,
}

#[derive(Deserialize)]
struct StatusValue {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    message: String,
}

impl ChromeBrowser {
    pub fn new(options: ChromeOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("building webdriver status client")?;
        Ok(Self { options, http })
    }

    pub fn options(&self) -> &ChromeOptions {
        &self.options
    }

    /// Fails fast with a readable message when no driver is listening.
    async fn ensure_ready(&self) -> Result<()> {
        let status_url = format!("{}/status", self.options.webdriver_url.trim_end_matches('/'));
        let reply: StatusReply = self
            .http
            .get(&status_url)
            .send()
            .await
            .with_context(|| format!("webdriver not reachable at {status_url}"))?
            .json()
            .await
            .context("unexpected webdriver status reply")?;
        if !reply.value.ready {
            return Err(anyhow!("webdriver not ready: {}", reply.value.message));
        }
        Ok(())
    }
}

#[async_trait]
impl Browser for ChromeBrowser {
    type Page = WebDriverPage;

    async fn open(&self) -> Result<WebDriverPage> {
        self.ensure_ready().await?;
        let mut caps = DesiredCapabilities::chrome();
        if self.options.headless {
            caps.add_arg("--headless=new")?;
        }
        caps.add_arg("--disable-gpu")?;
        caps.set_no_sandbox()?;
        caps.set_disable_dev_shm_usage()?;
        caps.add_arg(&format!("--user-agent={}", random_desktop_ua()))?;
        caps.add_arg("--disable-blink-features=AutomationControlled")?;
        caps.add_arg("--start-maximized")?;
        let driver = WebDriver::new(&self.options.webdriver_url, caps)
            .await
            .context("failed to start browser session")?;
        info!(webdriver = %self.options.webdriver_url, "browser session opened");
        Ok(WebDriverPage { driver })
    }

    async fn close(&self, page: WebDriverPage) -> Result<()> {
        page.driver.quit().await.context("failed to quit browser")?;
        Ok(())
    }
}

// -------------------------
// Page capability over thirtyfour
// -------------------------

pub struct WebDriverPage {
    driver: WebDriver,
}

#[async_trait]
impl Page for WebDriverPage {
    type Element = WebElement;

    async fn navigate(&self, url: &str) -> Result<()> {
        self.driver
            .goto(url)
            .await
            .with_context(|| format!("navigation to {url} failed"))?;
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.driver
            .execute("window.scrollTo(0, document.body.scrollHeight);", Vec::new())
            .await?;
        Ok(())
    }

    async fn page_height(&self) -> Result<u64> {
        let ret = self
            .driver
            .execute("return document.body.scrollHeight;", Vec::new())
            .await?;
        let h: f64 = ret.convert()?;
        Ok(h.max(0.0) as u64)
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<WebElement>> {
        Ok(self.driver.find_all(By::Css(selector)).await?)
    }

    async fn find_first(&self, within: &WebElement, selector: &str) -> Result<Option<WebElement>> {
        let hits = within.find_all(By::Css(selector)).await?;
        Ok(hits.into_iter().next())
    }

    async fn attribute(&self, element: &WebElement, name: &str) -> Result<Option<String>> {
        Ok(element.attr(name).await?)
    }

    async fn text(&self, element: &WebElement) -> Result<String> {
        Ok(element.text().await?)
    }
}

// -------------------------
// Misc helpers
// -------------------------

fn random_desktop_ua() -> String {
    const UAS: &[&str] = &[
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0 Safari/537.36",
    ];
    let i = rng().random_range(0..UAS.len());
    UAS[i].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_comes_from_pool() {
        let ua = random_desktop_ua();
        assert!(ua.starts_with("Mozilla/5.0"));
    }

    #[tokio::test]
    async fn open_fails_cleanly_without_driver() {
        let browser = ChromeBrowser::new(ChromeOptions {
            webdriver_url: "http://127.0.0.1:9".to_string(),
            headless: true,
        })
        .unwrap();
        let err = browser.open().await.err().expect("no driver on port 9");
        assert!(format!("{err:#}").contains("webdriver not reachable"));
    }
}
