use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::page::Page;
use crate::progress::Reporter;

/// First container selector with at least one match, and its matches.
pub async fn find_containers<P: Page>(
    page: &P,
    selectors: &[String],
) -> Option<(String, Vec<P::Element>)> {
    for sel in selectors {
        match page.find_all(sel).await {
            Ok(found) if !found.is_empty() => return Some((sel.clone(), found)),
            Ok(_) => {}
            Err(e) => debug!(selector = %sel, "container lookup failed: {e:#}"),
        }
    }
    None
}

/// Scrolls until the page stops growing or `max_scrolls` is spent.
/// Returns how many scroll iterations ran.
pub async fn scroll_until_stable<P: Page>(
    page: &P,
    max_scrolls: usize,
    settle: Duration,
    reporter: &Reporter,
) -> anyhow::Result<usize> {
    let mut last_height = page.page_height().await?;
    let mut count = 0usize;
    while count < max_scrolls {
        page.scroll_to_bottom().await?;
        sleep(settle).await;
        let new_height = page.page_height().await?;
        count += 1;
        reporter.status(format!("Scroll iteration {count}/{max_scrolls}"));
        if new_height <= last_height {
            break;
        }
        last_height = new_height;
    }
    Ok(count)
}

/// Locate listing cards, scroll to trigger lazy loading, then locate again.
/// An empty result is not an error: the page may simply have no listings.
pub async fn harvest<P: Page>(
    page: &P,
    container_selectors: &[String],
    max_scrolls: usize,
    settle: Duration,
    reporter: &Reporter,
) -> anyhow::Result<Vec<P::Element>> {
    match find_containers(page, container_selectors).await {
        Some((sel, found)) => {
            reporter.status(format!("Found {} items using selector: {sel}", found.len()))
        }
        None => reporter.status("No items found before scrolling"),
    }

    scroll_until_stable(page, max_scrolls, settle, reporter).await?;

    match find_containers(page, container_selectors).await {
        Some((sel, found)) => {
            reporter.status(format!(
                "Found {} total items after scrolling using selector: {sel}",
                found.len()
            ));
            Ok(found)
        }
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::HtmlPage;

    fn cards(n: usize, class: &str) -> String {
        (0..n)
            .map(|i| format!(r#"<div class="{class}"><a href="/item/{i}">item {i}</a></div>"#))
            .collect()
    }

    #[tokio::test]
    async fn stops_once_height_is_stable() {
        // grows on the first scroll, flat on the second
        let page = HtmlPage::from_snapshots(vec![cards(2, "card"), cards(4, "card")]);
        let n = scroll_until_stable(&page, 5, Duration::ZERO, &Reporter::silent())
            .await
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(page.scroll_count(), 2);
    }

    #[tokio::test]
    async fn stops_when_the_page_shrinks() {
        let page = HtmlPage::from_snapshots(vec![cards(4, "card"), cards(2, "card"), cards(6, "card")]);
        let n = scroll_until_stable(&page, 5, Duration::ZERO, &Reporter::silent())
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(page.scroll_count(), 1);
    }

    #[tokio::test]
    async fn respects_scroll_budget() {
        let snaps = (1..=10).map(|n| cards(n, "card")).collect();
        let page = HtmlPage::from_snapshots(snaps);
        let n = scroll_until_stable(&page, 3, Duration::ZERO, &Reporter::silent())
            .await
            .unwrap();
        assert_eq!(n, 3);
    }

    #[tokio::test]
    async fn zero_budget_never_scrolls() {
        let page = HtmlPage::from_snapshots(vec![cards(1, "card"), cards(2, "card")]);
        let n = scroll_until_stable(&page, 0, Duration::ZERO, &Reporter::silent())
            .await
            .unwrap();
        assert_eq!(n, 0);
        assert_eq!(page.scroll_count(), 0);
    }

    #[tokio::test]
    async fn uses_first_selector_with_matches() {
        let page = HtmlPage::new(format!("{}{}", cards(1, "a-card"), cards(3, "b-card")));
        let selectors = vec![".missing".to_string(), ".b-card".to_string(), ".a-card".to_string()];
        let (sel, found) = find_containers(&page, &selectors).await.unwrap();
        assert_eq!(sel, ".b-card");
        assert_eq!(found.len(), 3);
    }

    #[tokio::test]
    async fn returns_what_is_loaded_after_scrolling() {
        let page = HtmlPage::from_snapshots(vec![cards(2, "card"), cards(5, "card")]);
        let found = harvest(&page, &[".card".to_string()], 5, Duration::ZERO, &Reporter::silent())
            .await
            .unwrap();
        assert_eq!(found.len(), 5);
    }

    #[tokio::test]
    async fn no_matching_selector_yields_empty() {
        let page = HtmlPage::new(cards(2, "card"));
        let found = harvest(&page, &[".nope".to_string()], 2, Duration::ZERO, &Reporter::silent())
            .await
            .unwrap();
        assert!(found.is_empty());
    }
}
