//! Date-keyed feature tables and their columnar form
//!
//! Feature groups keep one row per primary-key date. Batches arrive as polars
//! `DataFrame`s with arbitrary numeric columns; [`FeatureTable`] validates the
//! batch, converts every non-key column to `f64` and holds the rows ordered by
//! date so merging and range filtering are plain map operations.

use crate::error::{Result, StoreError};
use crate::range::DateRange;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Day number of 1970-01-01 counted from 0001-01-01 (CE day 1)
const UNIX_EPOCH_DAY_CE: i32 = 719_163;

/// How many colliding keys to spell out in an error message
const MAX_REPORTED_KEYS: usize = 5;

/// One row: the key date and its non-null feature values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub values: BTreeMap<String, f64>,
}

/// Counts produced by [`FeatureTable::merge`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeOutcome {
    /// Rows whose key was new to the table
    pub inserted: usize,
    /// Rows that replaced an existing row with the same key
    pub replaced: usize,
}

/// Rows keyed by a unique date plus the ordered list of non-key columns
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    primary_key: String,
    columns: Vec<String>,
    rows: BTreeMap<NaiveDate, BTreeMap<String, f64>>,
}

impl FeatureTable {
    /// An empty table with only the key column
    pub fn new(primary_key: impl Into<String>) -> Self {
        Self {
            primary_key: primary_key.into(),
            columns: Vec::new(),
            rows: BTreeMap::new(),
        }
    }

    /// Validate a batch and convert it to a table.
    ///
    /// Fails with `Schema` when the key column is missing, null or not a date,
    /// or when another column is not numeric, and with `DuplicateKey` when the
    /// batch repeats a date.
    pub fn from_dataframe(df: &DataFrame, primary_key: &str) -> Result<Self> {
        let key_series = df.column(primary_key).map_err(|_| {
            StoreError::Schema(format!(
                "Key column '{}' not found in batch (columns: {})",
                primary_key,
                df.get_column_names().join(", ")
            ))
        })?;
        let dates = key_dates(key_series)?;

        let mut columns = Vec::new();
        let mut values = Vec::new();
        for series in df.get_columns() {
            if series.name() == primary_key {
                continue;
            }
            columns.push(series.name().to_string());
            values.push(column_as_f64(series)?);
        }

        let mut rows = BTreeMap::new();
        let mut duplicates = Vec::new();
        for (idx, date) in dates.into_iter().enumerate() {
            let row: BTreeMap<String, f64> = columns
                .iter()
                .zip(values.iter())
                .filter_map(|(name, column)| column[idx].map(|v| (name.clone(), v)))
                .collect();
            if rows.insert(date, row).is_some() {
                duplicates.push(date);
            }
        }
        if !duplicates.is_empty() {
            return Err(StoreError::DuplicateKey(format!(
                "batch repeats key(s) {}",
                describe_keys(&duplicates)
            )));
        }

        Ok(Self {
            primary_key: primary_key.to_string(),
            columns,
            rows,
        })
    }

    /// Build a table from already-typed rows, keeping `columns` order first.
    ///
    /// Columns used by a row but missing from `columns` are appended.
    pub fn from_rows(
        primary_key: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<FeatureRow>,
    ) -> Result<Self> {
        let mut table = Self {
            primary_key: primary_key.into(),
            columns,
            rows: BTreeMap::new(),
        };
        let mut duplicates = Vec::new();
        for row in rows {
            table.register_columns(row.values.keys());
            if table.rows.insert(row.date, row.values).is_some() {
                duplicates.push(row.date);
            }
        }
        if !duplicates.is_empty() {
            return Err(StoreError::DuplicateKey(format!(
                "rows repeat key(s) {}",
                describe_keys(&duplicates)
            )));
        }
        Ok(table)
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Non-key column names in order of first appearance
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains_key(&self, date: NaiveDate) -> bool {
        self.rows.contains_key(&date)
    }

    /// Key dates in ascending order
    pub fn keys(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.keys().copied()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&BTreeMap<String, f64>> {
        self.rows.get(&date)
    }

    /// Rows in ascending key order
    pub fn rows(&self) -> Vec<FeatureRow> {
        self.rows
            .iter()
            .map(|(date, values)| FeatureRow {
                date: *date,
                values: values.clone(),
            })
            .collect()
    }

    /// `(date, value)` pairs of one column, skipping rows where it is null
    pub fn column_values(&self, column: &str) -> Result<BTreeMap<NaiveDate, f64>> {
        if !self.columns.iter().any(|c| c == column) {
            return Err(StoreError::Schema(format!(
                "Column '{}' not found (columns: {})",
                column,
                self.columns.join(", ")
            )));
        }
        Ok(self
            .rows
            .iter()
            .filter_map(|(date, values)| values.get(column).map(|v| (*date, *v)))
            .collect())
    }

    /// Merge `batch` into this table.
    ///
    /// Without `overwrite` any key collision fails with `DuplicateKey` and the
    /// table is left unchanged. With `overwrite` colliding rows are replaced
    /// whole by the incoming ones and all other rows are kept.
    pub fn merge(&mut self, batch: FeatureTable, overwrite: bool) -> Result<MergeOutcome> {
        if !overwrite {
            let collisions: Vec<NaiveDate> =
                batch.keys().filter(|d| self.contains_key(*d)).collect();
            if !collisions.is_empty() {
                return Err(StoreError::DuplicateKey(format!(
                    "key(s) {} already exist; insert with overwrite to replace them",
                    describe_keys(&collisions)
                )));
            }
        }

        self.register_columns(batch.columns.iter());
        let mut outcome = MergeOutcome::default();
        for (date, values) in batch.rows {
            match self.rows.entry(date) {
                Entry::Occupied(mut existing) => {
                    existing.insert(values);
                    outcome.replaced += 1;
                }
                Entry::Vacant(slot) => {
                    slot.insert(values);
                    outcome.inserted += 1;
                }
            }
        }
        Ok(outcome)
    }

    /// Copy of the rows whose key falls inside `range`
    pub fn filter_range(&self, range: &DateRange) -> FeatureTable {
        FeatureTable {
            primary_key: self.primary_key.clone(),
            columns: self.columns.clone(),
            rows: self
                .rows
                .range(range.start()..=range.end())
                .map(|(date, values)| (*date, values.clone()))
                .collect(),
        }
    }

    /// Columnar form: the key as a `Date` column followed by nullable `Float64` columns
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let days: Vec<i32> = self
            .rows
            .keys()
            .map(|d| d.num_days_from_ce() - UNIX_EPOCH_DAY_CE)
            .collect();
        let mut series = Vec::with_capacity(self.columns.len() + 1);
        series.push(Series::new(&self.primary_key, days).cast(&DataType::Date)?);

        for name in &self.columns {
            let values: Vec<Option<f64>> = self
                .rows
                .values()
                .map(|row| row.get(name).copied())
                .collect();
            series.push(Series::new(name, values));
        }

        Ok(DataFrame::new(series)?)
    }

    fn register_columns<'a, I>(&mut self, names: I)
    where
        I: IntoIterator<Item = &'a String>,
    {
        for name in names {
            if !self.columns.contains(name) {
                self.columns.push(name.clone());
            }
        }
    }
}

/// Parse the key column, accepting `Date`, `Datetime` and ISO `YYYY-MM-DD` strings
fn key_dates(series: &Series) -> Result<Vec<NaiveDate>> {
    let name = series.name();
    match series.dtype() {
        DataType::Date => {
            let days = series.cast(&DataType::Int32)?;
            days.i32()?
                .into_iter()
                .enumerate()
                .map(|(idx, day)| {
                    let day = day.ok_or_else(|| null_key(name, idx))?;
                    day.checked_add(UNIX_EPOCH_DAY_CE)
                        .and_then(NaiveDate::from_num_days_from_ce_opt)
                        .ok_or_else(|| {
                            StoreError::Schema(format!("Key '{}' row {} is out of range", name, idx))
                        })
                })
                .collect()
        }
        DataType::Datetime(_, _) => key_dates(&series.cast(&DataType::Date)?),
        DataType::Utf8 => series
            .utf8()?
            .into_iter()
            .enumerate()
            .map(|(idx, text)| {
                let text = text.ok_or_else(|| null_key(name, idx))?;
                parse_iso_date(text).ok_or_else(|| {
                    StoreError::Schema(format!(
                        "Key '{}' row {} is not an ISO date: '{}'",
                        name, idx, text
                    ))
                })
            })
            .collect(),
        other => Err(StoreError::Schema(format!(
            "Key column '{}' must hold dates, found {}",
            name, other
        ))),
    }
}

/// Accept `YYYY-MM-DD`, optionally followed by a time part after `T` or a space
fn parse_iso_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.len() == 10 {
        return NaiveDate::parse_from_str(text, "%Y-%m-%d").ok();
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(text) {
        return Some(stamp.date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|stamp| stamp.date())
}

/// Non-key column as `f64`; NaN and infinities count as missing
fn column_as_f64(series: &Series) -> Result<Vec<Option<f64>>> {
    let dtype = series.dtype();
    let usable = dtype.is_numeric() || matches!(dtype, DataType::Boolean | DataType::Null);
    if !usable {
        return Err(StoreError::Schema(format!(
            "Column '{}' cannot be converted to f64 (type {})",
            series.name(),
            dtype
        )));
    }

    let as_f64 = series.cast(&DataType::Float64)?;
    let values = as_f64
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect();
    Ok(values)
}

fn null_key(name: &str, idx: usize) -> StoreError {
    StoreError::Schema(format!("Key '{}' is null at row {}", name, idx))
}

fn describe_keys(keys: &[NaiveDate]) -> String {
    let shown: Vec<String> = keys
        .iter()
        .take(MAX_REPORTED_KEYS)
        .map(|d| d.to_string())
        .collect();
    if keys.len() > MAX_REPORTED_KEYS {
        format!("{} (+{} more)", shown.join(", "), keys.len() - MAX_REPORTED_KEYS)
    } else {
        shown.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn batch(dates: &[&str], prices: &[f64]) -> FeatureTable {
        let df = df!("date" => dates, "price" => prices).unwrap();
        FeatureTable::from_dataframe(&df, "date").unwrap()
    }

    #[test]
    fn test_from_dataframe_reads_string_keys() {
        let table = batch(&["2024-01-02", "2024-01-01"], &[2.0, 1.0]);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.keys().collect::<Vec<_>>(),
            vec![day("2024-01-01"), day("2024-01-02")]
        );
        assert_eq!(table.get(day("2024-01-02")).unwrap()["price"], 2.0);
    }

    #[test]
    fn test_missing_key_column_is_schema_error() {
        let df = df!("day" => &["2024-01-01"], "price" => &[1.0]).unwrap();
        let err = FeatureTable::from_dataframe(&df, "date").unwrap_err();
        assert!(matches!(err, StoreError::Schema(_)));
    }

    #[test]
    fn test_unparseable_key_is_schema_error() {
        let df = df!("date" => &["yesterday"], "price" => &[1.0]).unwrap();
        let err = FeatureTable::from_dataframe(&df, "date").unwrap_err();
        assert!(matches!(err, StoreError::Schema(_)));
    }

    #[test]
    fn test_out_of_range_date_key_is_schema_error() {
        let dates = Series::new("date", &[i32::MAX - 10])
            .cast(&DataType::Date)
            .unwrap();
        let df = DataFrame::new(vec![dates, Series::new("price", &[1.0])]).unwrap();
        let err = FeatureTable::from_dataframe(&df, "date").unwrap_err();
        assert!(matches!(err, StoreError::Schema(_)));
    }

    #[test]
    fn test_key_with_time_part() {
        let df = df!(
            "date" => &["2024-01-01T00:00:00", "2024-01-02 12:30:00"],
            "price" => &[1.0, 2.0]
        )
        .unwrap();
        let table = FeatureTable::from_dataframe(&df, "date").unwrap();
        assert_eq!(
            table.keys().collect::<Vec<_>>(),
            vec![day("2024-01-01"), day("2024-01-02")]
        );
    }

    #[test]
    fn test_key_with_trailing_garbage_is_schema_error() {
        for text in ["2024-01-01garbage", "2024-01-01Tx", "2024-01-01 noon"] {
            let df = df!("date" => &[text], "price" => &[1.0]).unwrap();
            let err = FeatureTable::from_dataframe(&df, "date").unwrap_err();
            assert!(matches!(err, StoreError::Schema(_)), "accepted {text}");
        }
    }

    #[test]
    fn test_text_feature_column_is_schema_error() {
        let df = df!("date" => &["2024-01-01"], "city" => &["Stockholm"]).unwrap();
        let err = FeatureTable::from_dataframe(&df, "date").unwrap_err();
        assert!(matches!(err, StoreError::Schema(_)));
    }

    #[test]
    fn test_repeated_key_in_batch_is_duplicate() {
        let df = df!("date" => &["2024-01-01", "2024-01-01"], "price" => &[1.0, 2.0]).unwrap();
        let err = FeatureTable::from_dataframe(&df, "date").unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));
    }

    #[test]
    fn test_integer_and_null_values() {
        let df = df!(
            "date" => &["2024-01-01", "2024-01-02"],
            "is_weekend" => &[0i64, 1],
            "price_lag_7d" => &[None, Some(1.5f64)]
        )
        .unwrap();
        let table = FeatureTable::from_dataframe(&df, "date").unwrap();
        assert_eq!(table.get(day("2024-01-02")).unwrap()["is_weekend"], 1.0);
        assert!(!table.get(day("2024-01-01")).unwrap().contains_key("price_lag_7d"));
    }

    #[test]
    fn test_merge_without_overwrite_rejects_collision() {
        let mut table = batch(&["2024-01-01", "2024-01-02"], &[1.0, 2.0]);
        let before = table.clone();
        let err = table
            .merge(batch(&["2024-01-02", "2024-01-03"], &[9.0, 3.0]), false)
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));
        assert_eq!(table, before);
    }

    #[test]
    fn test_merge_with_overwrite_replaces_matching_keys() {
        let mut table = batch(&["2024-01-01", "2024-01-02"], &[1.0, 2.0]);
        let outcome = table
            .merge(batch(&["2024-01-02", "2024-01-03"], &[9.0, 3.0]), true)
            .unwrap();
        assert_eq!(outcome, MergeOutcome { inserted: 1, replaced: 1 });
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(day("2024-01-01")).unwrap()["price"], 1.0);
        assert_eq!(table.get(day("2024-01-02")).unwrap()["price"], 9.0);
    }

    #[test]
    fn test_dataframe_round_trip_keeps_date_key() {
        let table = batch(&["2024-03-01", "2024-03-02"], &[1.25, 1.5]);
        let df = table.to_dataframe().unwrap();
        assert_eq!(df.column("date").unwrap().dtype(), &DataType::Date);
        let back = FeatureTable::from_dataframe(&df, "date").unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_filter_range() {
        let table = batch(&["2024-01-01", "2024-01-02", "2024-01-03"], &[1.0, 2.0, 3.0]);
        let range = DateRange::new(day("2024-01-02"), day("2024-01-03")).unwrap();
        let filtered = table.filter_range(&range);
        assert_eq!(
            filtered.keys().collect::<Vec<_>>(),
            vec![day("2024-01-02"), day("2024-01-03")]
        );
    }

    #[test]
    fn test_column_values_requires_known_column() {
        let table = batch(&["2024-01-01"], &[1.0]);
        assert_eq!(table.column_values("price").unwrap()[&day("2024-01-01")], 1.0);
        assert!(matches!(
            table.column_values("temperature").unwrap_err(),
            StoreError::Schema(_)
        ));
    }
}
