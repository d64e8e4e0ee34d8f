//! Expense error types.
//!
//! This module defines all error types that can occur during expense
//! approval, update and deletion.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use deptledger_shared::AppError;

use super::types::ExpenseStatus;
use crate::access::AccessError;
use crate::budget::BudgetError;

/// Errors that can occur during expense operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpenseError {
    /// Attempted an invalid status transition.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// The current status.
        from: ExpenseStatus,
        /// The attempted target status.
        to: ExpenseStatus,
    },

    /// Rejection reason is required but not provided.
    #[error("Rejection reason is required")]
    RejectionReasonRequired,

    /// Actor lacks a capability.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Only the submitter may change their own pending expense.
    #[error("Only the submitter may modify this expense while it is pending")]
    NotOwner,

    /// Staff may not modify an expense that already left pending.
    #[error("Expense is {0} and can no longer be modified")]
    NotPending(ExpenseStatus),

    /// Status cannot be set through a field update.
    #[error("Status changes must go through approve or reject")]
    StatusNotEditable,

    /// Expense not found in the caller's department.
    #[error("Expense not found: {0}")]
    NotFound(Uuid),

    /// Amount must be strictly positive.
    #[error("Amount must be greater than zero, got {0}")]
    InvalidAmount(Decimal),

    /// Other malformed input.
    #[error("{0}")]
    Validation(String),

    /// Budget rule violation (breakdown, availability).
    #[error(transparent)]
    Budget(#[from] BudgetError),
}

impl ExpenseError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidTransition { .. } | Self::StatusNotEditable => 409,
            Self::Access(_) | Self::NotOwner | Self::NotPending(_) => 403,
            Self::NotFound(_) => 404,
            Self::RejectionReasonRequired | Self::InvalidAmount(_) | Self::Validation(_) => 400,
            Self::Budget(err) => err.status_code(),
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } | Self::StatusNotEditable => "INVALID_STATE",
            Self::Access(_) | Self::NotOwner | Self::NotPending(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::RejectionReasonRequired | Self::InvalidAmount(_) | Self::Validation(_) => {
                "VALIDATION_ERROR"
            }
            Self::Budget(err) => err.error_code(),
        }
    }
}

impl From<ExpenseError> for AppError {
    fn from(err: ExpenseError) -> Self {
        match err {
            ExpenseError::Access(inner) => inner.into(),
            ExpenseError::Budget(inner) => inner.into(),
            ExpenseError::NotOwner | ExpenseError::NotPending(_) => {
                Self::Forbidden(err.to_string())
            }
            ExpenseError::InvalidTransition { .. } | ExpenseError::StatusNotEditable => {
                Self::InvalidState(err.to_string())
            }
            ExpenseError::NotFound(_) => Self::NotFound(err.to_string()),
            ExpenseError::RejectionReasonRequired
            | ExpenseError::InvalidAmount(_)
            | ExpenseError::Validation(_) => Self::Validation(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{Permission, Role};
    use rust_decimal_macros::dec;

    #[test]
    fn test_invalid_transition_error() {
        let err = ExpenseError::InvalidTransition {
            from: ExpenseStatus::Approved,
            to: ExpenseStatus::Approved,
        };
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.error_code(), "INVALID_STATE");
        assert!(err.to_string().contains("approved"));

        let app: AppError = err.into();
        assert_eq!(app.status_code(), 409);
    }

    #[test]
    fn test_rejection_reason_required_error() {
        let err = ExpenseError::RejectionReasonRequired;
        assert_eq!(err.status_code(), 400);
        let app: AppError = err.into();
        assert_eq!(app.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_ownership_errors_are_forbidden() {
        for err in [
            ExpenseError::NotOwner,
            ExpenseError::NotPending(ExpenseStatus::Approved),
            ExpenseError::Access(AccessError::MissingPermission {
                role: Role::Hod,
                permission: Permission::Delete,
            }),
        ] {
            assert_eq!(err.status_code(), 403);
            let app: AppError = err.into();
            assert_eq!(app.error_code(), "FORBIDDEN");
        }
    }

    #[test]
    fn test_budget_errors_pass_through() {
        let err: ExpenseError = BudgetError::InsufficientBudget {
            remaining: dec!(100),
            requested: dec!(101),
        }
        .into();
        assert_eq!(err.error_code(), "INSUFFICIENT_BUDGET");
        let app: AppError = err.into();
        assert_eq!(app.status_code(), 400);
    }

    #[test]
    fn test_not_found_error() {
        let err = ExpenseError::NotFound(Uuid::nil());
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.error_code(), "NOT_FOUND");
    }
}
