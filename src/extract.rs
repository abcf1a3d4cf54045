//! Field extraction from one listing card.
//!
//! Marketplace markup uses generated class names that change often, so each
//! field is located by an ordered list of [`Probe`]s. The first probe that
//! yields text accepted by the field's policy wins; a probe that errors or
//! finds nothing simply falls through to the next one.

use anyhow::Result;
use tracing::debug;
use url::Url;

use crate::model::ListingRecord;
use crate::page::Page;

/// Prefixes that mark a text node as a price rather than a title.
pub const CURRENCY_MARKERS: &[char] = &[
    '$', '€', '£', '¥', '₹', '₩', '₽', '₺', '₫', '₱', '฿', '₦', '₪',
];

// -------------------------
// Probes
// -------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Text,
    Attribute(String),
}

/// Where to look and what to read. `selector: None` reads the card itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub selector: Option<String>,
    pub target: Target,
}

impl Probe {
    pub fn text(selector: &str) -> Self {
        Self {
            selector: Some(selector.to_string()),
            target: Target::Text,
        }
    }

    pub fn attr(selector: &str, name: &str) -> Self {
        Self {
            selector: Some(selector.to_string()),
            target: Target::Attribute(name.to_string()),
        }
    }

    pub fn own_attr(name: &str) -> Self {
        Self {
            selector: None,
            target: Target::Attribute(name.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SelectorSet {
    /// Listing card containers, tried in order; the first non-empty match wins.
    pub containers: Vec<String>,
    pub title: Vec<Probe>,
    pub price: Vec<Probe>,
    pub link: Vec<Probe>,
}

impl Default for SelectorSet {
    fn default() -> Self {
        Self {
            containers: vec![
                "div[class*='x3ct3a4'] a[role='link']".to_string(),
                "div[class*='x1xmf6yo']".to_string(),
                "div[role='main'] div[style*='border-radius: 8px']".to_string(),
            ],
            title: vec![
                Probe::text("span[class*='x1lliihq']:not([class*='x193iq5w'])"),
                Probe::text("div[class*='x1gslohp'] span"),
                Probe::text("span[class*='xt0psk2']"),
            ],
            price: vec![
                Probe::text("span[class*='x193iq5w']"),
                Probe::text("span[class*='x1s928wv']"),
                Probe::text("span[class*='x1lliihq'][class*='x193iq5w']"),
            ],
            link: vec![Probe::own_attr("href"), Probe::attr("a", "href")],
        }
    }
}

async fn read_probe<P: Page>(page: &P, card: &P::Element, probe: &Probe) -> Result<Option<String>> {
    let found;
    let node = match &probe.selector {
        None => card,
        Some(sel) => match page.find_first(card, sel).await? {
            Some(n) => {
                found = n;
                &found
            }
            None => return Ok(None),
        },
    };
    match &probe.target {
        Target::Text => Ok(Some(page.text(node).await?)),
        Target::Attribute(name) => page.attribute(node, name).await,
    }
}

/// Runs `probes` in order and returns the first trimmed, non-empty value
/// that `accept` maps to `Some`.
pub async fn first_accepted<P, T, F>(
    page: &P,
    card: &P::Element,
    probes: &[Probe],
    accept: F,
) -> Option<T>
where
    P: Page,
    F: Fn(&str) -> Option<T>,
{
    for probe in probes {
        let raw = match read_probe(page, card, probe).await {
            Ok(Some(v)) => v,
            Ok(None) => continue,
            Err(e) => {
                debug!(?probe, "probe failed: {e:#}");
                continue;
            }
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(v) = accept(trimmed) {
            return Some(v);
        }
    }
    None
}

// -------------------------
// Field policies
// -------------------------

pub fn accept_title(text: &str) -> Option<String> {
    if text.starts_with(CURRENCY_MARKERS) || text.eq_ignore_ascii_case("free") {
        return None;
    }
    Some(text.to_string())
}

/// "free" is 0; otherwise currency markers and thousands separators are
/// dropped and the rest must be a finite decimal.
pub fn parse_price(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("free") {
        return Some(0.0);
    }
    let cleaned: String = text
        .chars()
        .filter(|c| !CURRENCY_MARKERS.contains(c) && *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Absolute http(s) url, resolving relative links against `base`.
pub fn resolve_link(base: Option<&Url>, href: &str) -> Option<String> {
    let url = match Url::parse(href) {
        Ok(u) => u,
        Err(url::ParseError::RelativeUrlWithoutBase) => base?.join(href).ok()?,
        Err(_) => return None,
    };
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

// -------------------------
// Card extraction
// -------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFields {
    pub title: String,
    pub price: Option<f64>,
    pub price_raw: Option<String>,
    pub url: String,
}

impl ExtractedFields {
    pub fn into_record(self, location: &str) -> ListingRecord {
        ListingRecord {
            title: self.title,
            price: self.price,
            price_raw: self.price_raw,
            location: location.to_string(),
            url: self.url,
        }
    }
}

/// `None` when the card has no usable title or no resolvable link. A
/// missing or unparseable price keeps the card with `price: None`.
pub async fn extract<P: Page>(
    page: &P,
    card: &P::Element,
    selectors: &SelectorSet,
    base: Option<&Url>,
) -> Option<ExtractedFields> {
    let title = first_accepted(page, card, &selectors.title, accept_title).await?;
    let priced = first_accepted(page, card, &selectors.price, |t| {
        parse_price(t).map(|p| (p, t.to_string()))
    })
    .await;
    let url = first_accepted(page, card, &selectors.link, |h| resolve_link(base, h)).await?;

    let (price, price_raw) = match priced {
        Some((p, raw)) => (Some(p), Some(raw)),
        None => (None, None),
    };
    Some(ExtractedFields {
        title,
        price,
        price_raw,
        url,
    })
}
