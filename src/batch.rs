use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::warn;

use crate::error::ValidationError;
use crate::model::{BatchResult, ConfigRun, QueryConfig, ResultTable, SessionOutcome};
use crate::progress::Reporter;
use crate::runner::Scrape;

/// Ordered marketplace configs for one interactive session. Position is the
/// only identity a config has.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    configs: Vec<QueryConfig>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, config: QueryConfig) -> usize {
        self.configs.push(config);
        self.configs.len() - 1
    }

    pub fn remove(&mut self, index: usize) -> Result<QueryConfig, ValidationError> {
        if index >= self.configs.len() {
            return Err(ValidationError::NoSuchConfig {
                index,
                len: self.configs.len(),
            });
        }
        Ok(self.configs.remove(index))
    }

    pub fn configs(&self) -> &[QueryConfig] {
        &self.configs
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn clear(&mut self) {
        self.configs.clear();
    }
}

/// Runs every config once, in order. A config that fails or finds nothing
/// contributes an empty table; it never stops the rest of the batch.
pub async fn run_batch(
    scraper: &dyn Scrape,
    configs: &[QueryConfig],
    reporter: &Reporter,
) -> Result<BatchResult, ValidationError> {
    if configs.is_empty() {
        return Err(ValidationError::EmptyBatch);
    }

    let mut runs = Vec::with_capacity(configs.len());
    let mut combined = ResultTable::new();

    for (index, config) in configs.iter().enumerate() {
        reporter.status(format!(
            "Scraping data for {} ({}/{})...",
            config.city(),
            index + 1,
            configs.len()
        ));
        let outcome = match scraper.scrape(config, reporter).await {
            Ok(o) => o,
            Err(e) => {
                warn!(index, city = config.city(), "session failed: {e:#}");
                SessionOutcome::empty()
            }
        };
        reporter.config_done(
            index,
            config.city(),
            config.product(),
            outcome.rows.len(),
            outcome.raw_item_count,
        );
        combined.extend(outcome.rows.iter().cloned());
        runs.push(ConfigRun {
            config: config.clone(),
            rows: outcome.rows,
            raw_item_count: outcome.raw_item_count,
        });
    }

    let completed_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    Ok(BatchResult {
        runs,
        combined,
        completed_at,
    })
}
