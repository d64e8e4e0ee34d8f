//! Fiscal year derivation.
//!
//! Departments budget on an April–March cycle labelled `"YYYY-YY"`. Every
//! place that needs a fiscal year for a date goes through [`fiscal_year_of`];
//! storage queries filter by the date range of a [`FiscalYear`] instead of
//! recomputing the label in SQL.

pub mod calendar;

pub use calendar::{FISCAL_YEAR_START_MONTH, FiscalError, FiscalYear, fiscal_year_of};
