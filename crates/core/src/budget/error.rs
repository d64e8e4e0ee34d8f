//! Budget error types.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use deptledger_shared::AppError;

/// Budget-related errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BudgetError {
    /// Category not found or not visible.
    #[error("Category not found: {0}")]
    CategoryNotFound(Uuid),

    /// Category exists but is deactivated.
    #[error("Category is inactive: {0}")]
    CategoryInactive(Uuid),

    /// Budget instance not found in the caller's department.
    #[error("Budget not found: {0}")]
    BudgetNotFound(Uuid),

    /// Budget instance still has expenses recorded against it.
    #[error("Budget {0} has linked expenses and cannot be deleted")]
    BudgetInUse(Uuid),

    /// Amount cannot be negative.
    #[error("{0} cannot be negative")]
    NegativeAmount(&'static str),

    /// Amount must be strictly positive.
    #[error("{0} must be greater than zero")]
    NonPositiveAmount(&'static str),

    /// Amount does not fit the ledger's precision.
    #[error("{field} {amount} exceeds 15 integer digits or 4 decimal places")]
    AmountOutOfRange {
        /// Field the amount came from.
        field: &'static str,
        /// Offending amount.
        amount: Decimal,
    },

    /// A required text field is blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Breakdown items add up to more than the parent amount.
    #[error("Breakdown total {allocated} exceeds amount {amount}")]
    BreakdownExceedsAmount {
        /// Sum of breakdown item amounts.
        allocated: Decimal,
        /// Parent amount.
        amount: Decimal,
    },

    /// Availability check failed.
    #[error("Insufficient budget: remaining {remaining}, requested {requested}")]
    InsufficientBudget {
        /// Remaining spendable balance.
        remaining: Decimal,
        /// Amount requested.
        requested: Decimal,
    },
}

impl BudgetError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::CategoryNotFound(_) | Self::BudgetNotFound(_) => 404,
            Self::BudgetInUse(_) => 409,
            Self::CategoryInactive(_)
            | Self::NegativeAmount(_)
            | Self::NonPositiveAmount(_)
            | Self::AmountOutOfRange { .. }
            | Self::MissingField(_)
            | Self::BreakdownExceedsAmount { .. }
            | Self::InsufficientBudget { .. } => 400,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::CategoryNotFound(_) | Self::BudgetNotFound(_) => "NOT_FOUND",
            Self::BudgetInUse(_) => "INVALID_STATE",
            Self::InsufficientBudget { .. } => "INSUFFICIENT_BUDGET",
            _ => "VALIDATION_ERROR",
        }
    }
}

impl From<BudgetError> for AppError {
    fn from(err: BudgetError) -> Self {
        match err {
            BudgetError::InsufficientBudget {
                remaining,
                requested,
            } => Self::InsufficientBudget {
                remaining,
                requested,
            },
            BudgetError::CategoryNotFound(_) | BudgetError::BudgetNotFound(_) => {
                Self::NotFound(err.to_string())
            }
            BudgetError::BudgetInUse(_) => Self::InvalidState(err.to_string()),
            _ => Self::Validation(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_insufficient_budget_maps_through() {
        let err = BudgetError::InsufficientBudget {
            remaining: dec!(50000),
            requested: dec!(60000),
        };
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.error_code(), "INSUFFICIENT_BUDGET");

        let app: AppError = err.into();
        assert_eq!(app.error_code(), "INSUFFICIENT_BUDGET");
        assert_eq!(
            app.to_string(),
            "Insufficient budget: remaining 50000, requested 60000"
        );
    }

    #[test]
    fn test_not_found_and_in_use() {
        let id = Uuid::nil();
        assert_eq!(BudgetError::BudgetNotFound(id).status_code(), 404);
        assert_eq!(BudgetError::BudgetInUse(id).status_code(), 409);

        let app: AppError = BudgetError::CategoryNotFound(id).into();
        assert_eq!(app.status_code(), 404);
        let app: AppError = BudgetError::BudgetInUse(id).into();
        assert_eq!(app.error_code(), "INVALID_STATE");
    }

    #[test]
    fn test_validation_errors() {
        let err = BudgetError::NegativeAmount("allotted_amount");
        assert_eq!(err.to_string(), "allotted_amount cannot be negative");
        let app: AppError = err.into();
        assert_eq!(app.error_code(), "VALIDATION_ERROR");

        let err = BudgetError::BreakdownExceedsAmount {
            allocated: dec!(120),
            amount: dec!(100),
        };
        assert_eq!(err.error_code(), "VALIDATION_ERROR");

        let err = BudgetError::AmountOutOfRange {
            field: "amount",
            amount: dec!(0.00001),
        };
        assert_eq!(err.status_code(), 400);
        let app: AppError = err.into();
        assert_eq!(app.status_code(), 400);
        assert_eq!(app.error_code(), "VALIDATION_ERROR");
    }
}
