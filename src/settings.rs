use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::logging::LogFormat;
use crate::model::QueryConfig;
use crate::page::ChromeOptions;
use crate::runner::{DEFAULT_MARKETPLACE_URL, SearchTarget, Timings};

#[derive(Debug, Parser)]
#[command(name = "market-harvest")]
#[command(about = "Scrape marketplace listings through a real browser and export them as CSV")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "MH_LOG_FORMAT", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Option<Command>,

    /// Dashboard settings used when no subcommand is given
    #[command(flatten)]
    pub serve: ServeArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the dashboard (default)
    Serve(ServeArgs),

    /// Scrape one marketplace from the command line and write the archive
    Scrape(ScrapeArgs),

    /// Run harvest + extraction over saved HTML and print CSV
    Extract(ExtractArgs),
}

#[derive(Debug, Clone, Args)]
pub struct BrowserArgs {
    /// WebDriver server url
    #[arg(long, default_value = "http://localhost:9515", env = "MH_WEBDRIVER_URL")]
    pub webdriver_url: String,

    /// Run Chrome headless
    #[arg(long, env = "MH_HEADLESS")]
    pub headless: bool,

    /// Marketplace search page
    #[arg(long, default_value = DEFAULT_MARKETPLACE_URL, env = "MH_MARKETPLACE_URL")]
    pub marketplace_url: String,

    /// Pause after navigation, seconds
    #[arg(long, default_value_t = 15, env = "MH_INITIAL_LOAD_SECS")]
    pub initial_load_secs: u64,

    /// Pause after each scroll, seconds
    #[arg(long, default_value_t = 5, env = "MH_SCROLL_SETTLE_SECS")]
    pub scroll_settle_secs: u64,

    /// Scroll budget per page
    #[arg(long, default_value_t = 5, env = "MH_MAX_SCROLLS")]
    pub max_scrolls: usize,
}

impl BrowserArgs {
    pub fn chrome(&self) -> ChromeOptions {
        ChromeOptions {
            webdriver_url: self.webdriver_url.clone(),
            headless: self.headless,
        }
    }

    pub fn timings(&self) -> Timings {
        Timings {
            initial_load: Duration::from_secs(self.initial_load_secs),
            scroll_settle: Duration::from_secs(self.scroll_settle_secs),
            max_scrolls: self.max_scrolls,
        }
    }

    pub fn target(&self) -> Result<SearchTarget> {
        SearchTarget::new(&self.marketplace_url)
    }
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Listen address
    #[arg(long, default_value = "127.0.0.1:8080", env = "MH_BIND")]
    pub bind: SocketAddr,

    #[command(flatten)]
    pub browser: BrowserArgs,
}

#[derive(Debug, Clone, Args)]
pub struct ScrapeArgs {
    #[arg(long)]
    pub city: String,

    #[arg(long)]
    pub product: String,

    #[arg(long, default_value_t = 0)]
    pub min_price: u32,

    #[arg(long, default_value_t = 1000)]
    pub max_price: u32,

    /// Region code the marketplace scopes results by
    #[arg(long)]
    pub region: String,

    /// Partial instead of exact match
    #[arg(long)]
    pub partial: bool,

    /// Where to write the archive
    #[arg(short, long, default_value = "scraped_results.zip")]
    pub output: PathBuf,

    #[command(flatten)]
    pub browser: BrowserArgs,
}

impl ScrapeArgs {
    pub fn config(&self) -> Result<QueryConfig> {
        Ok(QueryConfig::new(
            &self.city,
            &self.product,
            self.min_price,
            self.max_price,
            &self.region,
            !self.partial,
        )?)
    }
}

#[derive(Debug, Clone, Args)]
pub struct ExtractArgs {
    /// HTML snapshots, first = initial load, each next = one more scroll
    #[arg(required = true)]
    pub snapshots: Vec<PathBuf>,

    /// Location written into every row
    #[arg(long, default_value = "")]
    pub city: String,

    /// Base for resolving relative listing links
    #[arg(long, default_value = DEFAULT_MARKETPLACE_URL)]
    pub base_url: String,

    #[arg(long, default_value_t = 5)]
    pub max_scrolls: usize,
}
