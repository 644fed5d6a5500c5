//! Inclusive calendar date ranges

use crate::error::{Result, StoreError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A range of calendar dates, inclusive of both endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting `start > end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(StoreError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// A range covering exactly one day
    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of days covered, counting both endpoints
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_range_is_inclusive() {
        let range = DateRange::new(day("2024-01-01"), day("2024-01-03")).unwrap();
        assert!(range.contains(day("2024-01-01")));
        assert!(range.contains(day("2024-01-03")));
        assert!(!range.contains(day("2024-01-04")));
        assert_eq!(range.num_days(), 3);
    }

    #[test]
    fn test_reversed_range_is_rejected() {
        let err = DateRange::new(day("2024-01-05"), day("2024-01-01")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRange { .. }));
    }

    #[test]
    fn test_single_day_range() {
        let range = DateRange::single(day("2024-02-29"));
        assert_eq!(range.num_days(), 1);
        assert_eq!(range.to_string(), "2024-02-29..=2024-02-29");
    }
}
