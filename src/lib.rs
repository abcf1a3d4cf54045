//! Browser-driven marketplace listing scraper.
//!
//! A batch of search configs runs strictly one after another: open a browser,
//! load the search url, scroll until the listing grid stops growing, pull
//! title / price / link out of every card, close the browser. Results are
//! shown on a small dashboard and bundled as CSV files in a ZIP archive.

pub mod batch;
pub mod error;
pub mod export;
pub mod extract;
pub mod harvest;
pub mod logging;
pub mod model;
pub mod page;
pub mod progress;
pub mod runner;
pub mod settings;
pub mod web;

pub use batch::{Batch, run_batch};
pub use error::{BatchBusy, ValidationError};
pub use model::{BatchResult, ListingRecord, QueryConfig, ResultTable, SessionOutcome};
pub use progress::{ProgressEvent, Reporter};
pub use runner::{Scrape, SearchTarget, SessionRunner, Timings};
