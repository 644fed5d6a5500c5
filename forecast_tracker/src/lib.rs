//! # Forecast Tracker
//!
//! Keeps a CSV log of daily price forecasts, fills in the observed values
//! as they become available and scores the forecasts against them.
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use forecast_tracker::PredictionTracker;
//! use std::collections::BTreeMap;
//!
//! # fn main() -> forecast_tracker::Result<()> {
//! let tracker = PredictionTracker::new("outputs/prediction_tracking.csv");
//! let day = |s: &str| s.parse::<NaiveDate>().unwrap();
//!
//! tracker.record_forecast(day("2024-02-10"), day("2024-02-03"), 1.20)?;
//! tracker.reconcile(&BTreeMap::from([(day("2024-02-10"), 1.22)]))?;
//! println!("{}", tracker.compute_metrics(Some(7))?);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod metrics;
pub mod record;
pub mod tracker;

pub use crate::error::{Result, TrackerError};
pub use crate::metrics::{ComparisonPoint, TrackingMetrics};
pub use crate::record::{PredictionRecord, ReconcileSummary, TrackingLog};
pub use crate::tracker::PredictionTracker;
