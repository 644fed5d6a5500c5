//! Error types for the feature_store crate

use chrono::NaiveDate;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors raised by the storage backends, feature groups and model stores
#[derive(Debug, Error)]
pub enum StoreError {
    /// A feature group, model or model version that must exist does not
    #[error("Not found: {0}")]
    NotFound(String),

    /// A primary key collided under append semantics
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// A batch is missing its key column or carries an unusable column
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// The managed store could not be reached or rejected the credentials
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Malformed caller input (names, mode text, model drafts)
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Only connectivity failures are worth retrying; everything else is a caller bug
    /// or a state the retry would hit again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::BackendUnavailable(_))
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, StoreError>;

impl From<PolarsError> for StoreError {
    fn from(err: PolarsError) -> Self {
        StoreError::Polars(err.to_string())
    }
}
