use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// -------------------------
// Query configuration
// -------------------------

/// One marketplace search. Built only through [`QueryConfig::new`], so a
/// value in hand has already passed the input checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryConfig {
    city: String,
    product: String,
    min_price: u32,
    max_price: u32,
    region_code: String,
    match_exact: bool,
}

impl QueryConfig {
    pub fn new(
        city: &str,
        product: &str,
        min_price: u32,
        max_price: u32,
        region_code: &str,
        match_exact: bool,
    ) -> Result<Self, ValidationError> {
        let city = required("city", city)?;
        let product = required("product", product)?;
        let region_code = required("region code", region_code)?;
        if min_price > max_price {
            return Err(ValidationError::PriceRange {
                min: min_price,
                max: max_price,
            });
        }
        Ok(Self {
            city,
            product,
            min_price,
            max_price,
            region_code,
            match_exact,
        })
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn min_price(&self) -> u32 {
        self.min_price
    }

    pub fn max_price(&self) -> u32 {
        self.max_price
    }

    pub fn region_code(&self) -> &str {
        &self.region_code
    }

    pub fn match_exact(&self) -> bool {
        self.match_exact
    }
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(v.to_string())
}

/// Unvalidated form payload, as posted by the dashboard.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryForm {
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub min_price: u32,
    #[serde(default = "default_max_price")]
    pub max_price: u32,
    #[serde(default)]
    pub region_code: String,
    #[serde(default = "default_exact")]
    pub match_exact: bool,
}

fn default_max_price() -> u32 {
    1000
}

fn default_exact() -> bool {
    true
}

impl TryFrom<QueryForm> for QueryConfig {
    type Error = ValidationError;

    fn try_from(f: QueryForm) -> Result<Self, Self::Error> {
        QueryConfig::new(
            &f.city,
            &f.product,
            f.min_price,
            f.max_price,
            &f.region_code,
            f.match_exact,
        )
    }
}

// -------------------------
// Extracted rows
// -------------------------

/// One listing card that yielded both a title and a url.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub title: String,
    /// Parsed from `price_raw`; 0 for "free".
    pub price: Option<f64>,
    /// Displayed price text, untouched.
    pub price_raw: Option<String>,
    pub location: String,
    pub url: String,
}

/// Rows from one config run, in DOM encounter order.
pub type ResultTable = Vec<ListingRecord>;

/// Outcome of one session: the rows plus how many raw containers were seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionOutcome {
    pub rows: ResultTable,
    pub raw_item_count: usize,
}

impl SessionOutcome {
    pub fn empty() -> Self {
        Self::default()
    }
}

// -------------------------
// Batch output
// -------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigRun {
    pub config: QueryConfig,
    pub rows: ResultTable,
    pub raw_item_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    /// One entry per config, in run order.
    pub runs: Vec<ConfigRun>,
    /// All rows, run order first, then row order.
    pub combined: ResultTable,
    /// RFC 3339.
    pub completed_at: String,
}

impl BatchResult {
    pub fn is_empty(&self) -> bool {
        self.combined.is_empty()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            configs: self.runs.len(),
            rows: self.combined.len(),
            raw_items: self.runs.iter().map(|r| r.raw_item_count).sum(),
            completed_at: self.completed_at.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub configs: usize,
    pub rows: usize,
    pub raw_items: usize,
    pub completed_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_trims_and_accepts_equal_bounds() {
        let c = QueryConfig::new("  Austin ", "bike", 50, 50, " 1234 ", false).unwrap();
        assert_eq!(c.city(), "Austin");
        assert_eq!(c.region_code(), "1234");
        assert!(!c.match_exact());
    }

    #[test]
    fn config_rejects_blank_fields() {
        assert_eq!(
            QueryConfig::new(" ", "bike", 0, 10, "1", true),
            Err(ValidationError::MissingField("city"))
        );
        assert_eq!(
            QueryConfig::new("Austin", "", 0, 10, "1", true),
            Err(ValidationError::MissingField("product"))
        );
        assert_eq!(
            QueryConfig::new("Austin", "bike", 0, 10, "", true),
            Err(ValidationError::MissingField("region code"))
        );
    }

    #[test]
    fn config_rejects_inverted_range() {
        let err = QueryConfig::new("Austin", "bike", 500, 10, "1", true).unwrap_err();
        assert_eq!(err, ValidationError::PriceRange { min: 500, max: 10 });
    }

    #[test]
    fn form_defaults_to_exact_match() {
        let form: QueryForm =
            serde_json::from_str(r#"{"city":"Austin","product":"bike","region_code":"1"}"#)
                .unwrap();
        let c = QueryConfig::try_from(form).unwrap();
        assert!(c.match_exact());
        assert_eq!(c.max_price(), 1000);
    }
}
