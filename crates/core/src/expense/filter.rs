//! Composable predicates for expense listings.
//!
//! Handlers turn query parameters into a list of predicates; the store
//! AND-combines them into one parameterized condition.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use deptledger_shared::types::{CategoryId, UserId};

use super::error::ExpenseError;
use super::types::ExpenseStatus;
use crate::fiscal::FiscalYear;

/// One filter over expenses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpensePredicate {
    /// Status equals.
    Status(ExpenseStatus),
    /// Category equals.
    Category(CategoryId),
    /// Budget instance equals (flexible model only).
    Budget(Uuid),
    /// Submitted by.
    CreatedBy(UserId),
    /// Vendor contains, case-insensitive.
    VendorContains(String),
    /// Expense date on or after.
    DateFrom(NaiveDate),
    /// Expense date on or before.
    DateTo(NaiveDate),
    /// Expense date within the fiscal year.
    FiscalYear(FiscalYear),
    /// Amount at least.
    AmountMin(Decimal),
    /// Amount at most.
    AmountMax(Decimal),
}

/// Query-string form of an expense filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseQuery {
    /// Status filter.
    pub status: Option<String>,
    /// Category filter.
    pub category_id: Option<CategoryId>,
    /// Budget filter.
    pub budget_id: Option<Uuid>,
    /// Submitter filter.
    pub created_by: Option<UserId>,
    /// Vendor substring.
    pub vendor: Option<String>,
    /// Earliest date.
    pub from: Option<NaiveDate>,
    /// Latest date.
    pub to: Option<NaiveDate>,
    /// Fiscal year.
    pub fiscal_year: Option<FiscalYear>,
    /// Minimum amount.
    pub min_amount: Option<Decimal>,
    /// Maximum amount.
    pub max_amount: Option<Decimal>,
}

impl ExpenseQuery {
    /// Converts the query into predicates.
    ///
    /// # Errors
    ///
    /// Returns `ExpenseError::Validation` for an unknown status or an
    /// inverted date or amount range.
    pub fn into_predicates(self) -> Result<Vec<ExpensePredicate>, ExpenseError> {
        if let (Some(from), Some(to)) = (self.from, self.to)
            && from > to
        {
            return Err(ExpenseError::Validation(format!(
                "from ({from}) must not be after to ({to})"
            )));
        }
        if let (Some(min), Some(max)) = (self.min_amount, self.max_amount)
            && min > max
        {
            return Err(ExpenseError::Validation(format!(
                "min_amount ({min}) must not exceed max_amount ({max})"
            )));
        }

        let mut predicates = Vec::new();

        if let Some(status) = self.status {
            let parsed = ExpenseStatus::parse(&status)
                .ok_or_else(|| ExpenseError::Validation(format!("Unknown status '{status}'")))?;
            predicates.push(ExpensePredicate::Status(parsed));
        }
        if let Some(id) = self.category_id {
            predicates.push(ExpensePredicate::Category(id));
        }
        if let Some(id) = self.budget_id {
            predicates.push(ExpensePredicate::Budget(id));
        }
        if let Some(id) = self.created_by {
            predicates.push(ExpensePredicate::CreatedBy(id));
        }
        if let Some(vendor) = self.vendor.filter(|v| !v.trim().is_empty()) {
            predicates.push(ExpensePredicate::VendorContains(vendor.trim().to_string()));
        }
        if let Some(date) = self.from {
            predicates.push(ExpensePredicate::DateFrom(date));
        }
        if let Some(date) = self.to {
            predicates.push(ExpensePredicate::DateTo(date));
        }
        if let Some(fy) = self.fiscal_year {
            predicates.push(ExpensePredicate::FiscalYear(fy));
        }
        if let Some(amount) = self.min_amount {
            predicates.push(ExpensePredicate::AmountMin(amount));
        }
        if let Some(amount) = self.max_amount {
            predicates.push(ExpensePredicate::AmountMax(amount));
        }

        Ok(predicates)
    }
}
