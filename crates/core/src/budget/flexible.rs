//! Flexible budget instances and their breakdowns.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::amount::ensure_storable;
use super::error::BudgetError;
use super::reconciliation::ReconciliationEngine;

/// A named slice of a budget or expense amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownItem {
    /// Item name.
    pub name: String,
    /// Item amount.
    pub amount: Decimal,
    /// Optional payment method.
    pub payment_method: Option<String>,
}

impl BreakdownItem {
    /// Creates an item without a payment method.
    #[must_use]
    pub fn new(name: impl Into<String>, amount: Decimal) -> Self {
        Self {
            name: name.into(),
            amount,
            payment_method: None,
        }
    }
}

/// Validates a breakdown against its parent amount.
///
/// Returns the allocated total on success.
///
/// # Errors
///
/// Returns `BudgetError::MissingField` for a nameless item,
/// `BudgetError::NonPositiveAmount` for a non-positive item,
/// `BudgetError::AmountOutOfRange` for an item the ledger cannot store, and
/// `BudgetError::BreakdownExceedsAmount` if the items add up to more than
/// `parent_amount`.
pub fn validate_breakdown(
    parent_amount: Decimal,
    items: &[BreakdownItem],
) -> Result<Decimal, BudgetError> {
    let mut allocated = Decimal::ZERO;
    for item in items {
        if item.name.trim().is_empty() {
            return Err(BudgetError::MissingField("breakdown item name"));
        }
        if item.amount <= Decimal::ZERO {
            return Err(BudgetError::NonPositiveAmount("breakdown item amount"));
        }
        ensure_storable("breakdown item amount", item.amount)?;
        allocated += item.amount;
    }

    if allocated > parent_amount {
        return Err(BudgetError::BreakdownExceedsAmount {
            allocated,
            amount: parent_amount,
        });
    }

    Ok(allocated)
}

/// Summary of one budget instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetInstanceSummary {
    /// Budget amount.
    pub amount: Decimal,
    /// Approved spend recorded against the budget.
    pub spent: Decimal,
    /// `amount - spent`.
    pub remaining: Decimal,
    /// `spent / amount * 100`, rounded to 2 places.
    pub utilization: Decimal,
    /// Sum of the budget's breakdown items.
    pub breakdown_allocated: Decimal,
    /// `amount - breakdown_allocated`.
    pub unallocated: Decimal,
}

impl BudgetInstanceSummary {
    /// Builds a summary from the budget amount, approved spend and breakdown.
    #[must_use]
    pub fn compute(amount: Decimal, spent: Decimal, breakdown_allocated: Decimal) -> Self {
        Self {
            amount,
            spent,
            remaining: amount - spent,
            utilization: ReconciliationEngine::utilization(spent, amount),
            breakdown_allocated,
            unallocated: amount - breakdown_allocated,
        }
    }
}
