use std::io::{Cursor, Read};
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use market_harvest::export::{COMBINED_ENTRY, package, read_table};
use market_harvest::extract::SelectorSet;
use market_harvest::page::HtmlBrowser;
use market_harvest::{
    ListingRecord, QueryConfig, Reporter, Scrape, SearchTarget, SessionOutcome, SessionRunner,
    Timings, ValidationError, run_batch,
};

fn fixture(name: &str) -> String {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    std::fs::read_to_string(path).unwrap()
}

fn cfg(city: &str, product: &str) -> QueryConfig {
    QueryConfig::new(city, product, 0, 2000, "112", true).unwrap()
}

fn record(city: &str, title: &str) -> ListingRecord {
    ListingRecord {
        title: title.to_string(),
        price: Some(10.0),
        price_raw: Some("$10".to_string()),
        location: city.to_string(),
        url: format!("https://market.example/item/{title}"),
    }
}

/// Fails for cities listed in `fail`, returns one row per call otherwise.
struct Scripted {
    fail: Vec<&'static str>,
    calls: Mutex<Vec<String>>,
}

impl Scripted {
    fn new(fail: Vec<&'static str>) -> Self {
        Self {
            fail,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Scrape for Scripted {
    async fn scrape(&self, config: &QueryConfig, _reporter: &Reporter) -> Result<SessionOutcome> {
        self.calls.lock().unwrap().push(config.city().to_string());
        if self.fail.iter().any(|f| *f == config.city()) {
            return Err(anyhow!("browser crashed"));
        }
        Ok(SessionOutcome {
            rows: vec![record(config.city(), &format!("{}-1", config.city()))],
            raw_item_count: 3,
        })
    }
}

#[tokio::test]
async fn default_selectors_work_on_marketplace_markup() {
    let runner = SessionRunner::new(
        HtmlBrowser::new(vec![fixture("search_initial.html"), fixture("search_scrolled.html")]),
        SearchTarget::new("https://www.facebook.com/marketplace/category/search/").unwrap(),
        SelectorSet::default(),
        Timings::instant(5),
    );
    let out = runner.run(&cfg("Austin", "bike"), &Reporter::silent()).await;

    assert_eq!(out.raw_item_count, 4);
    let titles: Vec<_> = out.rows.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Trek Domane road bike", "Kids bike, needs tires", "Vintage Peugeot frame"]
    );
    assert_eq!(out.rows[0].price, Some(1250.0));
    assert_eq!(out.rows[0].price_raw.as_deref(), Some("$1,250"));
    assert_eq!(
        out.rows[0].url,
        "https://www.facebook.com/marketplace/item/1001/?ref=search"
    );
    assert_eq!(out.rows[1].price, Some(0.0));
    assert_eq!(out.rows[2].price, None);
    assert_eq!(out.rows[2].price_raw, None);
}

#[tokio::test]
async fn failing_config_does_not_stop_the_batch() {
    let scraper = Scripted::new(vec!["A"]);
    let configs = vec![cfg("A", "bike"), cfg("B", "bike")];
    let result = run_batch(&scraper, &configs, &Reporter::silent()).await.unwrap();

    assert_eq!(*scraper.calls.lock().unwrap(), vec!["A", "B"]);
    assert_eq!(result.runs.len(), 2);
    assert!(result.runs[0].rows.is_empty());
    assert_eq!(result.runs[0].raw_item_count, 0);
    assert_eq!(result.combined, vec![record("B", "B-1")]);
    assert_eq!(result.summary().raw_items, 3);
}

#[tokio::test]
async fn combined_table_follows_run_order() {
    let scraper = Scripted::new(vec![]);
    let configs = vec![cfg("C", "bike"), cfg("A", "bike"), cfg("B", "bike")];
    let result = run_batch(&scraper, &configs, &Reporter::silent()).await.unwrap();
    let cities: Vec<_> = result.combined.iter().map(|r| r.location.as_str()).collect();
    assert_eq!(cities, vec!["C", "A", "B"]);
}

#[tokio::test]
async fn empty_batch_is_rejected_before_scraping() {
    let scraper = Scripted::new(vec![]);
    let err = run_batch(&scraper, &[], &Reporter::silent()).await.unwrap_err();
    assert_eq!(err, ValidationError::EmptyBatch);
    assert!(scraper.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn archive_holds_per_config_and_combined_tables() {
    let scraper = Scripted::new(vec!["Dallas"]);
    let configs = vec![
        cfg("Austin", "bike"),
        cfg("Dallas", "bike"),
        cfg("Austin", "bike"),
        cfg("Houston", "desk"),
    ];
    let result = run_batch(&scraper, &configs, &Reporter::silent()).await.unwrap();
    let bytes = package(&result).unwrap();

    let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "Austin_bike_result.csv",
            "Austin_bike_result_2.csv",
            "Houston_desk_result.csv",
            COMBINED_ENTRY,
        ]
    );

    let mut combined = Vec::new();
    zip.by_name(COMBINED_ENTRY)
        .unwrap()
        .read_to_end(&mut combined)
        .unwrap();
    assert_eq!(read_table(&combined).unwrap(), result.combined);
    assert_eq!(result.combined.len(), 3);
}
