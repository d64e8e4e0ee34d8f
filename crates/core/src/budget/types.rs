//! Budget data types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use deptledger_shared::types::CategoryId;

use super::amount::ensure_storable;
use super::error::BudgetError;
use super::flexible::BreakdownItem;
use crate::fiscal::{FiscalYear, fiscal_year_of};

/// Input for creating a category.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryInput {
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
}

impl CreateCategoryInput {
    /// Validates the input.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::MissingField` if the name is blank.
    pub fn validate(&self) -> Result<(), BudgetError> {
        if self.name.trim().is_empty() {
            return Err(BudgetError::MissingField("name"));
        }
        Ok(())
    }
}

/// Partial update for a category.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategoryInput {
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// Activate or deactivate.
    pub is_active: Option<bool>,
}

impl UpdateCategoryInput {
    /// Validates the input.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::MissingField` if a provided name is blank.
    pub fn validate(&self) -> Result<(), BudgetError> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(BudgetError::MissingField("name"));
        }
        Ok(())
    }
}

/// Lifecycle of a budget plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    /// Work in progress.
    #[default]
    Draft,
    /// Sent for allotment.
    Submitted,
}

impl PlanStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "submitted" => Some(Self::Submitted),
            _ => None,
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for upserting a budget plan keyed by (department, category, fiscal year).
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertBudgetPlanInput {
    /// Category being planned.
    pub category_id: CategoryId,
    /// Fiscal year being planned.
    pub fiscal_year: FiscalYear,
    /// Requested amount.
    pub proposed_amount: Decimal,
    /// Free-text justification.
    pub justification: Option<String>,
    /// Plan status.
    #[serde(default)]
    pub status: PlanStatus,
}

impl UpsertBudgetPlanInput {
    /// Validates the input.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::NegativeAmount` if the proposed amount is negative
    /// and `BudgetError::AmountOutOfRange` if it does not fit the ledger.
    pub fn validate(&self) -> Result<(), BudgetError> {
        if self.proposed_amount < Decimal::ZERO {
            return Err(BudgetError::NegativeAmount("proposed_amount"));
        }
        ensure_storable("proposed_amount", self.proposed_amount)
    }
}

/// Input for upserting a budget allotment keyed by (department, category, fiscal year).
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertAllotmentInput {
    /// Category being allotted.
    pub category_id: CategoryId,
    /// Fiscal year being allotted.
    pub fiscal_year: FiscalYear,
    /// Granted amount.
    pub allotted_amount: Decimal,
    /// Free-text notes.
    pub notes: Option<String>,
}

impl UpsertAllotmentInput {
    /// Validates the input.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::NegativeAmount` if the allotted amount is negative
    /// and `BudgetError::AmountOutOfRange` if it does not fit the ledger.
    pub fn validate(&self) -> Result<(), BudgetError> {
        if self.allotted_amount < Decimal::ZERO {
            return Err(BudgetError::NegativeAmount("allotted_amount"));
        }
        ensure_storable("allotted_amount", self.allotted_amount)
    }
}

/// Input for creating a flexible budget instance.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateFlexibleBudgetInput {
    /// Optional category the budget is tied to.
    pub category_id: Option<CategoryId>,
    /// Display name.
    pub name: String,
    /// Total amount.
    pub amount: Decimal,
    /// Funding source.
    pub source: Option<String>,
    /// Payment method.
    pub payment_method: Option<String>,
    /// Date the budget was granted.
    pub budget_date: NaiveDate,
    /// Fiscal year; defaults to the one containing `budget_date`.
    pub fiscal_year: Option<FiscalYear>,
    /// Breakdown items.
    #[serde(default)]
    pub breakdown: Vec<BreakdownItem>,
}

impl CreateFlexibleBudgetInput {
    /// Fiscal year the budget belongs to.
    #[must_use]
    pub fn resolved_fiscal_year(&self) -> FiscalYear {
        self.fiscal_year
            .unwrap_or_else(|| fiscal_year_of(self.budget_date))
    }

    /// Validates the input and its breakdown.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank name, a non-positive amount, or
    /// an invalid breakdown.
    pub fn validate(&self) -> Result<(), BudgetError> {
        if self.name.trim().is_empty() {
            return Err(BudgetError::MissingField("name"));
        }
        if self.amount <= Decimal::ZERO {
            return Err(BudgetError::NonPositiveAmount("amount"));
        }
        ensure_storable("amount", self.amount)?;
        super::flexible::validate_breakdown(self.amount, &self.breakdown)?;
        Ok(())
    }
}

/// Partial update for a flexible budget instance.
///
/// A provided `breakdown` replaces the existing items.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFlexibleBudgetInput {
    /// New name.
    pub name: Option<String>,
    /// New amount.
    pub amount: Option<Decimal>,
    /// New source.
    pub source: Option<String>,
    /// New payment method.
    pub payment_method: Option<String>,
    /// New budget date.
    pub budget_date: Option<NaiveDate>,
    /// Replacement breakdown.
    pub breakdown: Option<Vec<BreakdownItem>>,
}

impl UpdateFlexibleBudgetInput {
    /// Validates the update against the budget's current amount.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank name, a non-positive amount, or
    /// a breakdown exceeding the resulting amount.
    pub fn validate(&self, current_amount: Decimal) -> Result<(), BudgetError> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(BudgetError::MissingField("name"));
        }
        if let Some(amount) = self.amount {
            if amount <= Decimal::ZERO {
                return Err(BudgetError::NonPositiveAmount("amount"));
            }
            ensure_storable("amount", amount)?;
        }
        if let Some(items) = &self.breakdown {
            super::flexible::validate_breakdown(self.amount.unwrap_or(current_amount), items)?;
        }
        Ok(())
    }
}

/// Reference to a budget instance used by the flexible expense guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetRef {
    /// Budget ID.
    pub id: Uuid,
    /// Total amount.
    pub amount: Decimal,
}
