//! File-backed prediction tracker

use crate::error::{Result, TrackerError};
use crate::metrics::{latest_per_target, ComparisonPoint, TrackingMetrics};
use crate::record::{PredictionRecord, ReconcileSummary, TrackingLog};
use chrono::{Days, NaiveDate};
use feature_store::atomic::write_atomic;
use feature_store::{DateRange, FeatureGroup};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Records forecasts, reconciles them with observed values and scores them
///
/// Every operation loads the whole log, applies its change in memory and
/// atomically replaces the file, so a failed call leaves the log untouched.
#[derive(Debug, Clone)]
pub struct PredictionTracker {
    path: PathBuf,
}

impl PredictionTracker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load the log; `NotFound` if it has never been written
    pub fn load(&self) -> Result<TrackingLog> {
        if !self.exists() {
            return Err(TrackerError::NotFound(format!(
                "tracking log {}",
                self.path.display()
            )));
        }
        let file = File::open(&self.path)?;
        TrackingLog::read_csv(BufReader::new(file))
    }

    /// The full log in stored order
    pub fn records(&self) -> Result<Vec<PredictionRecord>> {
        Ok(self.load()?.records().to_vec())
    }

    /// Append one forecast, creating the log if needed
    pub fn record_forecast(
        &self,
        target_date: NaiveDate,
        forecast_made_on: NaiveDate,
        predicted_value: f64,
    ) -> Result<()> {
        let record = PredictionRecord::new(target_date, forecast_made_on, predicted_value)?;
        let mut log = self.load_or_default()?;
        log.append(record)?;
        self.persist(&log)?;
        debug!(%target_date, %forecast_made_on, predicted_value, "recorded forecast");
        Ok(())
    }

    /// Append a forecast run made on one day; any duplicate rejects the whole run
    pub fn record_forecasts(
        &self,
        forecast_made_on: NaiveDate,
        forecasts: &[(NaiveDate, f64)],
    ) -> Result<usize> {
        let batch = forecasts
            .iter()
            .map(|&(target, value)| PredictionRecord::new(target, forecast_made_on, value))
            .collect::<Result<Vec<_>>>()?;

        let mut log = self.load_or_default()?;
        let added = log.append_all(batch)?;
        self.persist(&log)?;
        info!(%forecast_made_on, added, "recorded forecast run");
        Ok(added)
    }

    /// Attach observed values to unreconciled forecasts
    pub fn reconcile(&self, actuals: &BTreeMap<NaiveDate, f64>) -> Result<ReconcileSummary> {
        let mut log = self.load()?;
        let summary = log.reconcile(actuals);
        if summary.updated > 0 {
            self.persist(&log)?;
        }
        info!(
            updated = summary.updated,
            unchanged = summary.unchanged,
            conflicting = summary.conflicting,
            "reconciled tracking log"
        );
        Ok(summary)
    }

    /// Reconcile against the `(date, column)` pairs stored in a feature group
    pub fn reconcile_from_feature_group(
        &self,
        group: &FeatureGroup,
        column: &str,
    ) -> Result<ReconcileSummary> {
        let actuals = group.read_table(None)?.column_values(column)?;
        debug!(
            group = %group.metadata().name,
            column,
            observations = actuals.len(),
            "read actuals from feature group"
        );
        self.reconcile(&actuals)
    }

    /// MAE/RMSE over reconciled forecasts, optionally over the trailing `window` days
    ///
    /// The window ends at the latest reconciled target date and includes it.
    pub fn compute_metrics(&self, window: Option<u32>) -> Result<TrackingMetrics> {
        let log = self.load()?;
        let Some(window) = window else {
            return Ok(TrackingMetrics::from_records(log.reconciled()));
        };
        if window == 0 {
            return Err(TrackerError::Validation(
                "metrics window must be at least one day".to_string(),
            ));
        }

        let Some(end) = log.reconciled().map(PredictionRecord::target_date).max() else {
            return Ok(TrackingMetrics::from_pairs(Vec::new()));
        };
        let start = end
            .checked_sub_days(Days::new(u64::from(window) - 1))
            .unwrap_or(NaiveDate::MIN);
        let range = DateRange::new(start, end)?;
        Ok(metrics_in(&log, &range))
    }

    /// MAE/RMSE over reconciled forecasts whose target date falls in `range`
    pub fn compute_metrics_in_range(&self, range: DateRange) -> Result<TrackingMetrics> {
        let log = self.load()?;
        Ok(metrics_in(&log, &range))
    }

    /// Latest forecast per reconciled target date against its actual
    pub fn comparison(&self) -> Result<Vec<ComparisonPoint>> {
        let log = self.load()?;
        Ok(latest_per_target(log.records()))
    }

    fn load_or_default(&self) -> Result<TrackingLog> {
        match self.load() {
            Err(TrackerError::NotFound(_)) => Ok(TrackingLog::new()),
            other => other,
        }
    }

    fn persist(&self, log: &TrackingLog) -> Result<()> {
        write_atomic(&self.path, |file: &mut File| -> Result<()> {
            log.write_csv(file)
        })
    }
}

fn metrics_in(log: &TrackingLog, range: &DateRange) -> TrackingMetrics {
    TrackingMetrics::from_records(log.reconciled().filter(|r| range.contains(r.target_date())))
}
