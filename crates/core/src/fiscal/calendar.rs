//! April–March fiscal calendar.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use deptledger_shared::AppError;

/// Month (1-based) on which every fiscal year starts.
pub const FISCAL_YEAR_START_MONTH: u32 = 4;

/// Errors raised while parsing fiscal-year labels.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FiscalError {
    /// Label is not of the form `YYYY-YY`.
    #[error("Invalid fiscal year '{0}': expected YYYY-YY, e.g. 2024-25")]
    InvalidFormat(String),

    /// Second half of the label does not follow the first.
    #[error("Invalid fiscal year '{0}': {1} must be followed by {2:02}")]
    NonConsecutive(String, i32, i32),
}

impl From<FiscalError> for AppError {
    fn from(err: FiscalError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// A fiscal year, identified by the calendar year in which it starts.
///
/// `FiscalYear::starting(2024)` runs from 2024-04-01 to 2025-03-31 and is
/// rendered as `"2024-25"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FiscalYear {
    start_year: i32,
}

/// Maps a calendar date to its fiscal year.
#[must_use]
pub fn fiscal_year_of(date: NaiveDate) -> FiscalYear {
    if date.month() >= FISCAL_YEAR_START_MONTH {
        FiscalYear::starting(date.year())
    } else {
        FiscalYear::starting(date.year() - 1)
    }
}

impl FiscalYear {
    /// Fiscal year starting in April of `start_year`.
    #[must_use]
    pub const fn starting(start_year: i32) -> Self {
        Self { start_year }
    }

    /// Fiscal year containing today's UTC date.
    #[must_use]
    pub fn current() -> Self {
        fiscal_year_of(Utc::now().date_naive())
    }

    /// Calendar year in which this fiscal year starts.
    #[must_use]
    pub const fn start_year(&self) -> i32 {
        self.start_year
    }

    /// First day of the fiscal year (April 1).
    #[must_use]
    pub fn start_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.start_year, FISCAL_YEAR_START_MONTH, 1)
            .unwrap_or(NaiveDate::MIN)
    }

    /// Last day of the fiscal year (March 31 of the following year).
    #[must_use]
    pub fn end_date(&self) -> NaiveDate {
        self.next().start_date().pred_opt().unwrap_or(NaiveDate::MAX)
    }

    /// Returns true if `date` falls inside this fiscal year.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        fiscal_year_of(date) == *self
    }

    /// The following fiscal year.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self::starting(self.start_year + 1)
    }

    /// The preceding fiscal year.
    #[must_use]
    pub const fn previous(&self) -> Self {
        Self::starting(self.start_year - 1)
    }

    /// Parses a `"YYYY-YY"` label.
    ///
    /// # Errors
    ///
    /// Returns `FiscalError` when the label is malformed or its halves are not
    /// consecutive years.
    pub fn parse(label: &str) -> Result<Self, FiscalError> {
        let invalid = || FiscalError::InvalidFormat(label.to_string());

        let (head, tail) = label.trim().split_once('-').ok_or_else(invalid)?;
        if head.len() != 4
            || tail.len() != 2
            || !head.bytes().all(|b| b.is_ascii_digit())
            || !tail.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let start_year: i32 = head.parse().map_err(|_| invalid())?;
        let suffix: i32 = tail.parse().map_err(|_| invalid())?;
        let expected = (start_year + 1) % 100;

        if suffix != expected {
            return Err(FiscalError::NonConsecutive(
                label.to_string(),
                start_year,
                expected,
            ));
        }

        Ok(Self::starting(start_year))
    }
}

impl fmt::Display for FiscalYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:02}",
            self.start_year,
            (self.start_year + 1).rem_euclid(100)
        )
    }
}

impl FromStr for FiscalYear {
    type Err = FiscalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for FiscalYear {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FiscalYear {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Self::parse(&label).map_err(serde::de::Error::custom)
    }
}
