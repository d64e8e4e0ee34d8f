//! Availability check run before an expense is accepted.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::BudgetError;
use super::reconciliation::BudgetFigures;

/// Outcome of an admitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admission {
    /// Remaining balance at check time.
    pub remaining: Decimal,
    /// Amount admitted.
    pub requested: Decimal,
}

impl Admission {
    /// Balance left once the admitted amount is spent.
    #[must_use]
    pub fn remaining_after(&self) -> Decimal {
        self.remaining - self.requested
    }
}

/// Admits or rejects a spend against a live remaining balance.
///
/// The caller must hold whatever lock serializes spends against the same
/// budget key while computing `figures` and persisting the expense.
pub struct AvailabilityGuard;

impl AvailabilityGuard {
    /// Checks `requested` against the remaining balance in `figures`.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::NonPositiveAmount` if `requested <= 0` and
    /// `BudgetError::InsufficientBudget` if `requested > remaining`.
    pub fn check_and_admit(
        figures: &BudgetFigures,
        requested: Decimal,
    ) -> Result<Admission, BudgetError> {
        Self::check_remaining(figures.remaining, requested)
    }

    /// Same check against a bare remaining balance.
    ///
    /// # Errors
    ///
    /// See [`AvailabilityGuard::check_and_admit`].
    pub fn check_remaining(remaining: Decimal, requested: Decimal) -> Result<Admission, BudgetError> {
        if requested <= Decimal::ZERO {
            return Err(BudgetError::NonPositiveAmount("amount"));
        }
        if requested > remaining {
            return Err(BudgetError::InsufficientBudget {
                remaining: remaining.normalize(),
                requested: requested.normalize(),
            });
        }
        Ok(Admission {
            remaining,
            requested,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rejection_message_drops_storage_scale() {
        let err = AvailabilityGuard::check_remaining(dec!(50000.0000), dec!(60000.00)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Insufficient budget: remaining 50000, requested 60000"
        );
    }

    #[test]
    fn test_exact_remaining_is_admitted() {
        let figures = BudgetFigures::compute(dec!(0), dec!(1000), dec!(900));
        let admission = AvailabilityGuard::check_and_admit(&figures, dec!(100)).unwrap();
        assert_eq!(admission.remaining, dec!(100));
        assert_eq!(admission.remaining_after(), dec!(0));
    }

    #[test]
    fn test_one_over_is_rejected() {
        let figures = BudgetFigures::compute(dec!(0), dec!(1000), dec!(900));
        let err = AvailabilityGuard::check_and_admit(&figures, dec!(101)).unwrap_err();
        assert_eq!(
            err,
            BudgetError::InsufficientBudget {
                remaining: dec!(100),
                requested: dec!(101)
            }
        );
    }

    #[test]
    fn test_zero_allotment_rejects_everything() {
        let figures = BudgetFigures::default();
        assert!(AvailabilityGuard::check_and_admit(&figures, dec!(0.01)).is_err());
    }

    #[test]
    fn test_non_positive_request_is_invalid() {
        assert_eq!(
            AvailabilityGuard::check_remaining(dec!(100), dec!(0)),
            Err(BudgetError::NonPositiveAmount("amount"))
        );
        assert!(AvailabilityGuard::check_remaining(dec!(100), dec!(-5)).is_err());
    }
}
