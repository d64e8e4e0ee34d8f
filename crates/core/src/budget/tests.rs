//! Property-based tests for the budget module.

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use deptledger_shared::types::CategoryId;

use super::error::BudgetError;
use super::guard::AvailabilityGuard;
use super::reconciliation::{
    BudgetFigures, CategoryRef, ReconciliationEngine, ReconciliationInput,
};
use crate::fiscal::FiscalYear;

/// Non-negative amounts with two decimal places.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000_000).prop_map(|minor| Decimal::new(minor, 2))
}

fn arb_row() -> impl Strategy<Value = (Decimal, Decimal, Decimal)> {
    (arb_amount(), arb_amount(), arb_amount())
}

fn build_input(rows: &[(Decimal, Decimal, Decimal)]) -> ReconciliationInput {
    let mut input = ReconciliationInput::default();
    for (i, (proposed, allotted, spent)) in rows.iter().enumerate() {
        let id = CategoryId::new();
        input.categories.push(CategoryRef {
            id,
            name: format!("Category {i}"),
        });
        input.proposed.insert(id, *proposed);
        input.allotted.insert(id, *allotted);
        input.spent.insert(id, *spent);
    }
    input
}

proptest! {
    /// Totals are column sums and derived figures are recomputed from them.
    #[test]
    fn prop_totals_are_sums(rows in prop::collection::vec(arb_row(), 0..12)) {
        let input = build_input(&rows);
        let report = ReconciliationEngine::reconcile(FiscalYear::starting(2024), &input);

        let spent: Decimal = report.rows.iter().map(|r| r.figures.spent).sum();
        let allotted: Decimal = report.rows.iter().map(|r| r.figures.allotted).sum();
        let proposed: Decimal = report.rows.iter().map(|r| r.figures.proposed).sum();

        prop_assert_eq!(report.rows.len(), rows.len());
        prop_assert_eq!(report.totals.spent, spent);
        prop_assert_eq!(report.totals.allotted, allotted);
        prop_assert_eq!(report.totals.variance, allotted - proposed);
        prop_assert_eq!(report.totals.remaining, allotted - spent);
        prop_assert_eq!(
            report.totals.utilization,
            ReconciliationEngine::utilization(spent, allotted)
        );
    }

    /// Utilization is zero exactly when nothing is allotted or spent.
    #[test]
    fn prop_zero_allotment_zero_utilization(spent in arb_amount()) {
        let figures = BudgetFigures::compute(Decimal::ZERO, Decimal::ZERO, spent);
        prop_assert_eq!(figures.utilization, Decimal::ZERO);
    }

    /// The guard admits up to and including the remaining balance.
    #[test]
    fn prop_guard_boundary(allotted in arb_amount(), spent in arb_amount(), requested in arb_amount()) {
        let figures = BudgetFigures::compute(Decimal::ZERO, allotted, spent);
        let result = AvailabilityGuard::check_and_admit(&figures, requested);

        if requested <= Decimal::ZERO {
            prop_assert_eq!(result, Err(BudgetError::NonPositiveAmount("amount")));
        } else if requested <= allotted - spent {
            prop_assert!(result.is_ok());
        } else {
            prop_assert_eq!(
                result,
                Err(BudgetError::InsufficientBudget { remaining: allotted - spent, requested })
            );
        }
    }
}

#[test]
fn test_allotment_spend_and_rejection_walkthrough() {
    let id = CategoryId::new();
    let mut input = ReconciliationInput::default();
    input.categories.push(CategoryRef {
        id,
        name: "Equipment".to_string(),
    });
    input.allotted.insert(id, dec!(500000));

    for amount in [dec!(200000), dec!(250000)] {
        let figures = ReconciliationEngine::figures_for(id, &input);
        AvailabilityGuard::check_and_admit(&figures, amount).unwrap();
        *input.spent.entry(id).or_default() += amount;
    }

    let figures = ReconciliationEngine::figures_for(id, &input);
    let err = AvailabilityGuard::check_and_admit(&figures, dec!(60000)).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Insufficient budget: remaining 50000, requested 60000"
    );

    let report = ReconciliationEngine::reconcile(FiscalYear::starting(2024), &input);
    assert_eq!(report.totals.allotted, dec!(500000));
    assert_eq!(report.totals.spent, dec!(450000));
    assert_eq!(report.totals.remaining, dec!(50000));
    assert_eq!(report.totals.utilization, dec!(90.00));
}
