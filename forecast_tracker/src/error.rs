//! Error types for the forecast_tracker crate

use chrono::NaiveDate;
use feature_store::StoreError;
use thiserror::Error;

/// Errors raised while recording, reconciling or scoring forecasts
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The tracking log does not exist yet
    #[error("Not found: {0}")]
    NotFound(String),

    /// The `(target_date, forecast_made_on)` pair is already logged
    #[error("Forecast for {target_date} made on {forecast_made_on} is already recorded")]
    DuplicateForecast {
        target_date: NaiveDate,
        forecast_made_on: NaiveDate,
    },

    /// Error related to parameter validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Error from the storage layer (feature group reads, date ranges)
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The log file could not be parsed or written as CSV
    #[error("CSV error: {0}")]
    Csv(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, TrackerError>;

impl From<csv::Error> for TrackerError {
    fn from(err: csv::Error) -> Self {
        TrackerError::Csv(err.to_string())
    }
}
