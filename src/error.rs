use thiserror::Error;

/// Synchronous input checks. These are the only failures that reach the
/// operator directly; everything below the batch loop is absorbed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("minimum price {min} is greater than maximum price {max}")]
    PriceRange { min: u32, max: u32 },

    #[error("add at least one marketplace before running")]
    EmptyBatch,

    #[error("no marketplace at position {index} (batch has {len})")]
    NoSuchConfig { index: usize, len: usize },
}

#[derive(Debug, Error)]
#[error("a batch is already running")]
pub struct BatchBusy;
