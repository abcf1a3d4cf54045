use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use super::{Browser, Page};

// -------------------------
// Static HTML page
// -------------------------

/// A page backed by saved HTML. Each snapshot stands for the document after
/// one more lazy-load round: scrolling moves to the next snapshot until the
/// last one, which then stays put.
pub struct HtmlPage {
    snapshots: Vec<String>,
    cursor: AtomicUsize,
    scrolls: AtomicUsize,
    url: Mutex<Option<String>>,
}

/// Detached copy of a matched element. The document is re-parsed per call,
/// so elements carry their own markup instead of tree handles.
#[derive(Debug, Clone)]
pub struct HtmlElement {
    outer_html: String,
    attrs: Vec<(String, String)>,
    text: String,
}

impl HtmlElement {
    fn capture(el: ElementRef<'_>) -> Self {
        let attrs = el
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let text = el
            .text()
            .flat_map(str::split_whitespace)
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            outer_html: el.html(),
            attrs,
            text,
        }
    }
}

impl HtmlPage {
    pub fn new(html: impl Into<String>) -> Self {
        Self::from_snapshots(vec![html.into()])
    }

    pub fn from_snapshots(snapshots: Vec<String>) -> Self {
        Self {
            snapshots,
            cursor: AtomicUsize::new(0),
            scrolls: AtomicUsize::new(0),
            url: Mutex::new(None),
        }
    }

    pub fn scroll_count(&self) -> usize {
        self.scrolls.load(Ordering::SeqCst)
    }

    pub fn current_url(&self) -> Option<String> {
        self.url.lock().ok().and_then(|u| u.clone())
    }

    fn current(&self) -> &str {
        let i = self.cursor.load(Ordering::SeqCst);
        self.snapshots.get(i).map(String::as_str).unwrap_or_default()
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("invalid selector {selector:?}: {e}"))
}

#[async_trait]
impl Page for HtmlPage {
    type Element = HtmlElement;

    async fn navigate(&self, url: &str) -> Result<()> {
        if self.snapshots.is_empty() {
            return Err(anyhow!("no snapshot to serve for {url}"));
        }
        self.cursor.store(0, Ordering::SeqCst);
        if let Ok(mut u) = self.url.lock() {
            *u = Some(url.to_string());
        }
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.scrolls.fetch_add(1, Ordering::SeqCst);
        let last = self.snapshots.len().saturating_sub(1);
        let _ = self
            .cursor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |i| {
                (i < last).then_some(i + 1)
            });
        Ok(())
    }

    async fn page_height(&self) -> Result<u64> {
        Ok(self.current().len() as u64)
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<HtmlElement>> {
        let sel = parse_selector(selector)?;
        let doc = Html::parse_document(self.current());
        Ok(doc.select(&sel).map(HtmlElement::capture).collect())
    }

    async fn find_first(&self, within: &HtmlElement, selector: &str) -> Result<Option<HtmlElement>> {
        let sel = parse_selector(selector)?;
        let fragment = Html::parse_fragment(&within.outer_html);
        let top = fragment.root_element().children().find_map(ElementRef::wrap);
        let hit = fragment
            .select(&sel)
            .find(|e| top.map(|t| t.id() != e.id()).unwrap_or(true))
            .map(HtmlElement::capture);
        Ok(hit)
    }

    async fn attribute(&self, element: &HtmlElement, name: &str) -> Result<Option<String>> {
        Ok(element
            .attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone()))
    }

    async fn text(&self, element: &HtmlElement) -> Result<String> {
        Ok(element.text.clone())
    }
}

// -------------------------
// Offline browser
// -------------------------

/// Serves the same snapshot sequence to every session.
#[derive(Debug, Clone)]
pub struct HtmlBrowser {
    snapshots: Vec<String>,
}

impl HtmlBrowser {
    pub fn new(snapshots: Vec<String>) -> Self {
        Self { snapshots }
    }

    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut snapshots = Vec::with_capacity(paths.len());
        for p in paths {
            let p = p.as_ref();
            let html = std::fs::read_to_string(p)
                .with_context(|| format!("reading snapshot {}", p.display()))?;
            snapshots.push(html);
        }
        Ok(Self::new(snapshots))
    }
}

#[async_trait]
impl Browser for HtmlBrowser {
    type Page = HtmlPage;

    async fn open(&self) -> Result<HtmlPage> {
        Ok(HtmlPage::from_snapshots(self.snapshots.clone()))
    }

    async fn close(&self, _page: HtmlPage) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARD: &str = r#"
        <div class="grid">
          <a class="card" href="/item/1"><span class="t">Road bike</span><span class="p">$120</span></a>
          <div class="card"><span class="t">Desk</span><a href="/item/2">open</a></div>
        </div>"#;

    #[tokio::test]
    async fn find_first_searches_descendants_only() {
        let page = HtmlPage::new(CARD);
        let cards = page.find_all(".card").await.unwrap();
        assert_eq!(cards.len(), 2);

        // The first card is itself an anchor; a descendant lookup must not return it.
        assert!(page.find_first(&cards[0], "a").await.unwrap().is_none());
        let a = page.find_first(&cards[1], "a").await.unwrap().unwrap();
        assert_eq!(page.attribute(&a, "href").await.unwrap().as_deref(), Some("/item/2"));
    }

    #[tokio::test]
    async fn text_is_whitespace_collapsed() {
        let page = HtmlPage::new("<p class='x'>  Road\n   bike  </p>");
        let p = page.find_all(".x").await.unwrap();
        assert_eq!(page.text(&p[0]).await.unwrap(), "Road bike");
    }

    #[tokio::test]
    async fn scrolling_advances_then_sticks_on_last_snapshot() {
        let page = HtmlPage::from_snapshots(vec!["<p>a</p>".into(), "<p>a</p><p>b</p>".into()]);
        let h0 = page.page_height().await.unwrap();
        page.scroll_to_bottom().await.unwrap();
        let h1 = page.page_height().await.unwrap();
        page.scroll_to_bottom().await.unwrap();
        let h2 = page.page_height().await.unwrap();
        assert!(h1 > h0);
        assert_eq!(h1, h2);
        assert_eq!(page.scroll_count(), 2);
    }

    #[tokio::test]
    async fn invalid_selector_is_an_error() {
        let page = HtmlPage::new("<p></p>");
        assert!(page.find_all("div[").await.is_err());
    }
}
