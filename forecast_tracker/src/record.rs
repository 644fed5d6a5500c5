//! Prediction records and the tracking log that holds them

use crate::error::{Result, TrackerError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::io::{Read, Write};
use tracing::warn;

/// One forecast for `target_date` made on `forecast_made_on`
///
/// Everything except `actual_value` is fixed at creation. `actual_value`
/// goes from absent to present once and is never revised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    target_date: NaiveDate,
    forecast_made_on: NaiveDate,
    predicted_value: f64,
    actual_value: Option<f64>,
}

impl PredictionRecord {
    /// A new, unreconciled forecast. The forecast must be made before its target day.
    pub fn new(
        target_date: NaiveDate,
        forecast_made_on: NaiveDate,
        predicted_value: f64,
    ) -> Result<Self> {
        let record = Self {
            target_date,
            forecast_made_on,
            predicted_value,
            actual_value: None,
        };
        record.validate()?;
        Ok(record)
    }

    pub fn target_date(&self) -> NaiveDate {
        self.target_date
    }

    pub fn forecast_made_on(&self) -> NaiveDate {
        self.forecast_made_on
    }

    pub fn predicted_value(&self) -> f64 {
        self.predicted_value
    }

    pub fn actual_value(&self) -> Option<f64> {
        self.actual_value
    }

    pub fn is_reconciled(&self) -> bool {
        self.actual_value.is_some()
    }

    /// `predicted - actual` once reconciled
    pub fn error(&self) -> Option<f64> {
        self.actual_value.map(|actual| self.predicted_value - actual)
    }

    fn key(&self) -> (NaiveDate, NaiveDate) {
        (self.target_date, self.forecast_made_on)
    }

    /// Attach the observed value; returns false if one was already attached
    fn reconcile(&mut self, actual: f64) -> bool {
        if self.actual_value.is_some() {
            return false;
        }
        self.actual_value = Some(actual);
        true
    }

    fn validate(&self) -> Result<()> {
        if self.forecast_made_on >= self.target_date {
            return Err(TrackerError::Validation(format!(
                "forecast for {} must be made before that day, not on {}",
                self.target_date, self.forecast_made_on
            )));
        }
        if !self.predicted_value.is_finite() {
            return Err(TrackerError::Validation(format!(
                "predicted value for {} is not a finite number",
                self.target_date
            )));
        }
        if let Some(actual) = self.actual_value {
            if !actual.is_finite() {
                return Err(TrackerError::Validation(format!(
                    "actual value for {} is not a finite number",
                    self.target_date
                )));
            }
        }
        Ok(())
    }
}

/// What a reconciliation pass changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileSummary {
    /// Records that received their actual value in this pass
    pub updated: usize,
    /// Already-reconciled records left as they were
    pub unchanged: usize,
    /// Of `unchanged`, records whose stored actual differs from the one offered
    pub conflicting: usize,
}

/// Ordered, append-only sequence of prediction records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingLog {
    records: Vec<PredictionRecord>,
    /// `(target_date, forecast_made_on)` of every record
    keys: HashSet<(NaiveDate, NaiveDate)>,
}

impl TrackingLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from existing records, checking every record and pair uniqueness
    pub fn from_records(records: Vec<PredictionRecord>) -> Result<Self> {
        let mut log = Self::new();
        for record in records {
            record.validate()?;
            log.append(record)?;
        }
        Ok(log)
    }

    pub fn records(&self) -> &[PredictionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, target_date: NaiveDate, forecast_made_on: NaiveDate) -> bool {
        self.keys.contains(&(target_date, forecast_made_on))
    }

    /// Records that have an actual value
    pub fn reconciled(&self) -> impl Iterator<Item = &PredictionRecord> {
        self.records.iter().filter(|r| r.is_reconciled())
    }

    /// Append one record, refusing a pair that is already logged
    pub fn append(&mut self, record: PredictionRecord) -> Result<()> {
        if !self.keys.insert(record.key()) {
            return Err(duplicate(&record));
        }
        self.records.push(record);
        Ok(())
    }

    /// Append a batch only if none of its pairs is logged or repeated
    pub fn append_all(&mut self, batch: Vec<PredictionRecord>) -> Result<usize> {
        let mut incoming = HashSet::with_capacity(batch.len());
        for record in &batch {
            if self.keys.contains(&record.key()) || !incoming.insert(record.key()) {
                return Err(duplicate(record));
            }
        }
        self.keys.extend(incoming);
        let added = batch.len();
        self.records.extend(batch);
        Ok(added)
    }

    /// Attach actuals to unreconciled records; the first value recorded wins
    pub fn reconcile(&mut self, actuals: &BTreeMap<NaiveDate, f64>) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        for record in &mut self.records {
            let Some(&actual) = actuals.get(&record.target_date) else {
                continue;
            };
            if !actual.is_finite() {
                continue;
            }
            if record.reconcile(actual) {
                summary.updated += 1;
                continue;
            }
            summary.unchanged += 1;
            if record.actual_value != Some(actual) {
                summary.conflicting += 1;
                warn!(
                    target_date = %record.target_date,
                    forecast_made_on = %record.forecast_made_on,
                    recorded = ?record.actual_value,
                    offered = actual,
                    "ignoring revised actual for an already reconciled forecast"
                );
            }
        }
        summary
    }

    /// Parse a CSV log with header `target_date,forecast_made_on,predicted_value,actual_value`
    pub fn read_csv<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let records = csv_reader
            .deserialize::<PredictionRecord>()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::from_records(records)
    }

    /// Write the log as CSV sorted by `(target_date, forecast_made_on)`
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut sorted: Vec<&PredictionRecord> = self.records.iter().collect();
        sorted.sort_by_key(|r| r.key());

        let mut csv_writer = csv::Writer::from_writer(writer);
        if sorted.is_empty() {
            csv_writer.write_record([
                "target_date",
                "forecast_made_on",
                "predicted_value",
                "actual_value",
            ])?;
        }
        for record in sorted {
            csv_writer.serialize(record)?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

fn duplicate(record: &PredictionRecord) -> TrackerError {
    TrackerError::DuplicateForecast {
        target_date: record.target_date,
        forecast_made_on: record.forecast_made_on,
    }
}
