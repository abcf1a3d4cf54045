use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use url::Url;

use market_harvest::export::{write_archive, write_table};
use market_harvest::extract::SelectorSet;
use market_harvest::harvest::harvest;
use market_harvest::page::{Browser, ChromeBrowser, HtmlBrowser, Page};
use market_harvest::runner::extract_rows;
use market_harvest::settings::{Cli, Command, ExtractArgs, ScrapeArgs, ServeArgs};
use market_harvest::web::{AppState, serve};
use market_harvest::{Reporter, SessionRunner, logging, run_batch};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format)?;

    match cli.command {
        None => run_serve(cli.serve).await,
        Some(Command::Serve(args)) => run_serve(args).await,
        Some(Command::Scrape(args)) => run_scrape(args).await,
        Some(Command::Extract(args)) => run_extract(args).await,
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let browser = ChromeBrowser::new(args.browser.chrome())?;
    let runner = SessionRunner::new(
        browser,
        args.browser.target()?,
        SelectorSet::default(),
        args.browser.timings(),
    );
    let state = AppState::new(Arc::new(runner));
    serve(state, args.bind).await.context("dashboard server failed")
}

async fn run_scrape(args: ScrapeArgs) -> Result<()> {
    let config = args.config()?;
    let browser = ChromeBrowser::new(args.browser.chrome())?;
    let runner = SessionRunner::new(
        browser,
        args.browser.target()?,
        SelectorSet::default(),
        args.browser.timings(),
    );
    let result = run_batch(&runner, &[config], &Reporter::silent()).await?;
    if result.is_empty() {
        info!("no listings found, archive not written");
        return Ok(());
    }
    write_archive(&result, &args.output)?;
    info!(path = %args.output.display(), rows = result.combined.len(), "archive written");
    Ok(())
}

async fn run_extract(args: ExtractArgs) -> Result<()> {
    let base = Url::parse(&args.base_url).context("invalid --base-url")?;
    let browser = HtmlBrowser::from_files(&args.snapshots)?;
    let page = browser.open().await?;
    page.navigate(base.as_str()).await?;

    let selectors = SelectorSet::default();
    let reporter = Reporter::silent();
    let cards = harvest(
        &page,
        &selectors.containers,
        args.max_scrolls,
        std::time::Duration::ZERO,
        &reporter,
    )
    .await?;
    let rows = extract_rows(&page, &cards, &selectors, &base, &args.city, &reporter).await;
    info!(cards = cards.len(), rows = rows.len(), "extraction finished");
    browser.close(page).await?;
    write_table(&rows, io::stdout().lock())
}
