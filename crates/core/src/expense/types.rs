//! Expense domain types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use deptledger_shared::types::{CategoryId, DepartmentId, UserId};

use super::error::ExpenseError;
use crate::budget::BreakdownItem;

/// Expense status in the approval workflow.
///
/// The only transitions are:
/// - Pending → Approved (approve)
/// - Pending → Rejected (reject)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseStatus {
    /// Awaiting a decision; the only editable state.
    Pending,
    /// Approved; counts toward spent.
    Approved,
    /// Rejected; terminal.
    Rejected,
}

impl ExpenseStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Returns true while the expense may still change.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Returns true for approved or rejected expenses.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !self.is_pending()
    }
}

impl fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of the two expense models a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseKind {
    /// Category-bound expense.
    Expense,
    /// Expense against a flexible budget instance.
    BudgetExpense,
}

impl ExpenseKind {
    /// Entity type recorded in the audit trail.
    #[must_use]
    pub const fn entity_type(&self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::BudgetExpense => "budget_expense",
        }
    }
}

/// The fields of an expense the state machine reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseSnapshot {
    /// Expense ID.
    pub id: Uuid,
    /// Which model the expense belongs to.
    pub kind: ExpenseKind,
    /// Owning department.
    pub department_id: DepartmentId,
    /// Submitter.
    pub created_by: UserId,
    /// Current status.
    pub status: ExpenseStatus,
    /// Amount.
    pub amount: Decimal,
}

/// A validated status transition with its audit fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpenseAction {
    /// Approve a pending expense.
    Approve {
        /// The approver.
        approved_by: UserId,
        /// When the expense was approved.
        approved_at: DateTime<Utc>,
        /// Optional notes from the approver.
        approval_notes: Option<String>,
    },
    /// Reject a pending expense.
    Reject {
        /// The approver who rejected it.
        approved_by: UserId,
        /// When the expense was rejected.
        approved_at: DateTime<Utc>,
        /// Mandatory reason.
        rejection_reason: String,
    },
}

impl ExpenseAction {
    /// Returns the new status resulting from this action.
    #[must_use]
    pub const fn new_status(&self) -> ExpenseStatus {
        match self {
            Self::Approve { .. } => ExpenseStatus::Approved,
            Self::Reject { .. } => ExpenseStatus::Rejected,
        }
    }

    /// Approver recorded on the expense.
    #[must_use]
    pub const fn approved_by(&self) -> UserId {
        match self {
            Self::Approve { approved_by, .. } | Self::Reject { approved_by, .. } => *approved_by,
        }
    }

    /// Decision timestamp.
    #[must_use]
    pub const fn approved_at(&self) -> DateTime<Utc> {
        match self {
            Self::Approve { approved_at, .. } | Self::Reject { approved_at, .. } => *approved_at,
        }
    }
}

/// A decision requested through the update endpoint's `status` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusDecision {
    /// Approve with optional notes.
    Approve {
        /// Notes.
        notes: Option<String>,
    },
    /// Reject with a reason.
    Reject {
        /// Reason, validated by the state machine.
        reason: Option<String>,
    },
}

impl StatusDecision {
    /// Interprets a requested status.
    ///
    /// # Errors
    ///
    /// Returns `ExpenseError::Validation` unless the status is `approved` or
    /// `rejected`.
    pub fn from_request(
        status: &str,
        notes: Option<String>,
        reason: Option<String>,
    ) -> Result<Self, ExpenseError> {
        match ExpenseStatus::parse(status) {
            Some(ExpenseStatus::Approved) => Ok(Self::Approve { notes }),
            Some(ExpenseStatus::Rejected) => Ok(Self::Reject { reason }),
            _ => Err(ExpenseError::Validation(format!(
                "status must be 'approved' or 'rejected', got '{status}'"
            ))),
        }
    }
}

/// Receipt metadata; the file itself lives in external storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptInput {
    /// Original file name.
    pub file_name: String,
    /// Where the file is hosted.
    pub file_url: String,
    /// MIME type.
    pub content_type: Option<String>,
    /// Size in bytes.
    pub size_bytes: Option<i64>,
}

impl ReceiptInput {
    /// Validates the metadata.
    ///
    /// # Errors
    ///
    /// Returns `ExpenseError::Validation` for blank names or urls or a
    /// negative size.
    pub fn validate(&self) -> Result<(), ExpenseError> {
        if self.file_name.trim().is_empty() {
            return Err(ExpenseError::Validation("file_name is required".into()));
        }
        if self.file_url.trim().is_empty() {
            return Err(ExpenseError::Validation("file_url is required".into()));
        }
        if self.size_bytes.is_some_and(|s| s < 0) {
            return Err(ExpenseError::Validation(
                "size_bytes cannot be negative".into(),
            ));
        }
        Ok(())
    }
}

fn validate_common(vendor: &str, amount: Decimal) -> Result<(), ExpenseError> {
    if vendor.trim().is_empty() {
        return Err(ExpenseError::Validation("vendor is required".into()));
    }
    if amount <= Decimal::ZERO {
        return Err(ExpenseError::InvalidAmount(amount));
    }
    crate::budget::ensure_storable("amount", amount)?;
    Ok(())
}

/// Input for a category-bound expense.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateExpenseInput {
    /// Category charged.
    pub category_id: CategoryId,
    /// Optional event the expense belongs to.
    pub event_id: Option<Uuid>,
    /// Vendor name.
    pub vendor: String,
    /// Amount, strictly positive.
    pub amount: Decimal,
    /// Date of the expense; selects the fiscal year.
    pub expense_date: NaiveDate,
    /// Description.
    pub description: Option<String>,
    /// Receipts attached at creation.
    #[serde(default)]
    pub receipts: Vec<ReceiptInput>,
}

impl CreateExpenseInput {
    /// Validates the input.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank vendor, non-positive amount or
    /// invalid receipt.
    pub fn validate(&self) -> Result<(), ExpenseError> {
        validate_common(&self.vendor, self.amount)?;
        self.receipts.iter().try_for_each(ReceiptInput::validate)
    }
}

/// Input for an expense in the flexible budget model.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBudgetExpenseInput {
    /// Budget instance charged.
    pub budget_id: Option<Uuid>,
    /// Category charged when no budget instance is given.
    pub category_id: Option<CategoryId>,
    /// Vendor name.
    pub vendor: String,
    /// Amount, strictly positive.
    pub amount: Decimal,
    /// Date of the expense.
    pub expense_date: NaiveDate,
    /// Description.
    pub description: Option<String>,
    /// Breakdown items.
    #[serde(default)]
    pub breakdown: Vec<BreakdownItem>,
    /// Receipts attached at creation.
    #[serde(default)]
    pub receipts: Vec<ReceiptInput>,
}

impl CreateBudgetExpenseInput {
    /// Validates the input.
    ///
    /// # Errors
    ///
    /// Returns a validation error when neither a budget nor a category is
    /// given, for a blank vendor, non-positive amount, invalid breakdown or
    /// invalid receipt.
    pub fn validate(&self) -> Result<(), ExpenseError> {
        if self.budget_id.is_none() && self.category_id.is_none() {
            return Err(ExpenseError::Validation(
                "either budget_id or category_id is required".into(),
            ));
        }
        validate_common(&self.vendor, self.amount)?;
        crate::budget::validate_breakdown(self.amount, &self.breakdown)?;
        self.receipts.iter().try_for_each(ReceiptInput::validate)
    }
}

/// Field changes to a pending expense. Status changes go through
/// [`StatusDecision`] instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExpenseChanges {
    /// New category (category-bound model).
    pub category_id: Option<CategoryId>,
    /// New vendor.
    pub vendor: Option<String>,
    /// New amount.
    pub amount: Option<Decimal>,
    /// New date.
    pub expense_date: Option<NaiveDate>,
    /// New description.
    pub description: Option<String>,
    /// Replacement breakdown (flexible model).
    pub breakdown: Option<Vec<BreakdownItem>>,
}

impl ExpenseChanges {
    /// Returns true if nothing would change.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.category_id.is_none()
            && self.vendor.is_none()
            && self.amount.is_none()
            && self.expense_date.is_none()
            && self.description.is_none()
            && self.breakdown.is_none()
    }

    /// Returns true if the change alters what the expense is charged against.
    #[must_use]
    pub const fn affects_spend(&self) -> bool {
        self.category_id.is_some() || self.amount.is_some() || self.expense_date.is_some()
    }

    /// Validates the changes against the expense's current amount.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank vendor, a non-positive or
    /// unstorable amount, or a breakdown exceeding the resulting amount.
    pub fn validate(&self, current_amount: Decimal) -> Result<(), ExpenseError> {
        if self.vendor.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err(ExpenseError::Validation("vendor is required".into()));
        }
        if let Some(amount) = self.amount {
            if amount <= Decimal::ZERO {
                return Err(ExpenseError::InvalidAmount(amount));
            }
            crate::budget::ensure_storable("amount", amount)?;
        }
        if let Some(items) = &self.breakdown {
            crate::budget::validate_breakdown(self.amount.unwrap_or(current_amount), items)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::BudgetError;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_parse_and_display() {
        assert_eq!(ExpenseStatus::parse("PENDING"), Some(ExpenseStatus::Pending));
        assert_eq!(ExpenseStatus::parse("Approved"), Some(ExpenseStatus::Approved));
        assert_eq!(ExpenseStatus::parse("rejected"), Some(ExpenseStatus::Rejected));
        assert_eq!(ExpenseStatus::parse("posted"), None);
        assert_eq!(format!("{}", ExpenseStatus::Rejected), "rejected");
        assert!(ExpenseStatus::Approved.is_terminal());
        assert!(!ExpenseStatus::Pending.is_terminal());
    }

    #[test]
    fn test_status_decision_from_request() {
        assert_eq!(
            StatusDecision::from_request("approved", Some("ok".into()), None).unwrap(),
            StatusDecision::Approve {
                notes: Some("ok".into())
            }
        );
        assert!(matches!(
            StatusDecision::from_request("rejected", None, None).unwrap(),
            StatusDecision::Reject { reason: None }
        ));
        assert!(StatusDecision::from_request("pending", None, None).is_err());
    }

    #[test]
    fn test_create_expense_validation() {
        let mut input = CreateExpenseInput {
            category_id: CategoryId::new(),
            event_id: None,
            vendor: "Acme".into(),
            amount: dec!(10),
            expense_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            description: None,
            receipts: vec![],
        };
        assert!(input.validate().is_ok());

        input.amount = dec!(0);
        assert!(matches!(input.validate(), Err(ExpenseError::InvalidAmount(_))));

        input.amount = dec!(0.00001);
        let err = input.validate().unwrap_err();
        assert!(matches!(
            err,
            ExpenseError::Budget(BudgetError::AmountOutOfRange { .. })
        ));
        assert_eq!(err.error_code(), "VALIDATION_ERROR");

        input.amount = dec!(1000000000000000);
        assert_eq!(input.validate().unwrap_err().status_code(), 400);

        input.amount = dec!(10);
        input.receipts.push(ReceiptInput {
            file_name: "bill.pdf".into(),
            file_url: String::new(),
            content_type: None,
            size_bytes: None,
        });
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_budget_expense_requires_target() {
        let input = CreateBudgetExpenseInput {
            budget_id: None,
            category_id: None,
            vendor: "Acme".into(),
            amount: dec!(10),
            expense_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            description: None,
            breakdown: vec![],
            receipts: vec![],
        };
        assert!(matches!(input.validate(), Err(ExpenseError::Validation(_))));
    }

    #[test]
    fn test_changes_validation() {
        let changes = ExpenseChanges {
            amount: Some(dec!(-1)),
            ..Default::default()
        };
        assert!(changes.validate(dec!(100)).is_err());
        assert!(changes.affects_spend());

        let changes = ExpenseChanges {
            amount: Some(dec!(550.12345)),
            ..Default::default()
        };
        assert!(matches!(
            changes.validate(dec!(100)),
            Err(ExpenseError::Budget(BudgetError::AmountOutOfRange { .. }))
        ));

        let changes = ExpenseChanges {
            description: Some("Updated".into()),
            ..Default::default()
        };
        assert!(changes.validate(dec!(100)).is_ok());
        assert!(!changes.affects_spend());
        assert!(ExpenseChanges::default().is_empty());
    }
}
