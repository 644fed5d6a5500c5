//! Accuracy metrics over reconciled forecasts

use crate::record::PredictionRecord;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Error metrics over `n` reconciled forecasts
///
/// `mae` and `rmse` are absent when nothing has been reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackingMetrics {
    pub n: usize,
    /// Mean Absolute Error
    pub mae: Option<f64>,
    /// Root Mean Squared Error
    pub rmse: Option<f64>,
}

impl TrackingMetrics {
    /// Metrics over `(predicted, actual)` pairs
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let errors: Vec<f64> = pairs
            .into_iter()
            .map(|(predicted, actual)| actual - predicted)
            .collect();

        if errors.is_empty() {
            return Self { n: 0, mae: None, rmse: None };
        }

        let n = errors.len() as f64;
        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
        let mse = errors.iter().map(|e| e.powi(2)).sum::<f64>() / n;

        Self {
            n: errors.len(),
            mae: Some(mae),
            rmse: Some(mse.sqrt()),
        }
    }

    pub(crate) fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a PredictionRecord>,
    {
        Self::from_pairs(records.into_iter().filter_map(|r| {
            r.actual_value().map(|actual| (r.predicted_value(), actual))
        }))
    }
}

impl std::fmt::Display for TrackingMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Forecast Tracking Metrics:")?;
        writeln!(f, "  N:     {}", self.n)?;
        match (self.mae, self.rmse) {
            (Some(mae), Some(rmse)) => {
                writeln!(f, "  MAE:   {:.4}", mae)?;
                writeln!(f, "  RMSE:  {:.4}", rmse)?;
            }
            _ => writeln!(f, "  no reconciled forecasts yet")?,
        }
        Ok(())
    }
}

/// One point of the forecast-versus-actual series
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComparisonPoint {
    pub target_date: NaiveDate,
    pub forecast_made_on: NaiveDate,
    pub predicted: f64,
    pub actual: f64,
    /// `predicted - actual`
    pub error: f64,
}

/// Latest forecast per reconciled target date, sorted by target date
pub(crate) fn latest_per_target<'a, I>(records: I) -> Vec<ComparisonPoint>
where
    I: IntoIterator<Item = &'a PredictionRecord>,
{
    let mut latest: BTreeMap<NaiveDate, &PredictionRecord> = BTreeMap::new();
    for record in records {
        if !record.is_reconciled() {
            continue;
        }
        latest
            .entry(record.target_date())
            .and_modify(|current| {
                if record.forecast_made_on() > current.forecast_made_on() {
                    *current = record;
                }
            })
            .or_insert(record);
    }

    latest
        .into_values()
        .filter_map(|r| {
            let actual = r.actual_value()?;
            Some(ComparisonPoint {
                target_date: r.target_date(),
                forecast_made_on: r.forecast_made_on(),
                predicted: r.predicted_value(),
                actual,
                error: r.predicted_value() - actual,
            })
        })
        .collect()
}
