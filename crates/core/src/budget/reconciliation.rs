//! Plan vs allotment vs spend reconciliation.
//!
//! The store supplies the raw per-category amounts for one department and
//! fiscal year; this module joins them and derives variance, remaining and
//! utilization. Missing plan, allotment or spend counts as zero.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use deptledger_shared::types::CategoryId;

use crate::fiscal::FiscalYear;

/// Figures for one category, one budget instance, or a total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BudgetFigures {
    /// Planned amount.
    pub proposed: Decimal,
    /// Granted amount.
    pub allotted: Decimal,
    /// Sum of approved expenses.
    pub spent: Decimal,
    /// `allotted - proposed`.
    pub variance: Decimal,
    /// `allotted - spent`.
    pub remaining: Decimal,
    /// `spent / allotted * 100`, 0 when nothing is allotted.
    pub utilization: Decimal,
}

impl BudgetFigures {
    /// Derives variance, remaining and utilization from the three inputs.
    #[must_use]
    pub fn compute(proposed: Decimal, allotted: Decimal, spent: Decimal) -> Self {
        Self {
            proposed,
            allotted,
            spent,
            variance: allotted - proposed,
            remaining: allotted - spent,
            utilization: ReconciliationEngine::utilization(spent, allotted),
        }
    }
}

/// Category reference fed into reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    /// Category ID.
    pub id: CategoryId,
    /// Category name.
    pub name: String,
}

/// Raw amounts loaded by the store for one department and fiscal year.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationInput {
    /// Active categories, in display order.
    pub categories: Vec<CategoryRef>,
    /// Proposed amount per category.
    pub proposed: HashMap<CategoryId, Decimal>,
    /// Allotted amount per category.
    pub allotted: HashMap<CategoryId, Decimal>,
    /// Approved spend per category.
    pub spent: HashMap<CategoryId, Decimal>,
}

impl ReconciliationInput {
    fn amount(map: &HashMap<CategoryId, Decimal>, id: CategoryId) -> Decimal {
        map.get(&id).copied().unwrap_or(Decimal::ZERO)
    }
}

/// One reconciliation row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationRow {
    /// Category ID.
    pub category_id: CategoryId,
    /// Category name.
    pub category_name: String,
    /// Row figures.
    #[serde(flatten)]
    pub figures: BudgetFigures,
}

/// Reconciliation of a department's fiscal year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Fiscal year reconciled.
    pub fiscal_year: FiscalYear,
    /// One row per active category.
    pub rows: Vec<ReconciliationRow>,
    /// Column sums with derived figures recomputed.
    pub totals: BudgetFigures,
}

/// Stateless reconciliation engine.
pub struct ReconciliationEngine;

impl ReconciliationEngine {
    /// Builds the report for `fiscal_year` from the raw amounts.
    #[must_use]
    pub fn reconcile(fiscal_year: FiscalYear, input: &ReconciliationInput) -> ReconciliationReport {
        let rows: Vec<ReconciliationRow> = input
            .categories
            .iter()
            .map(|category| ReconciliationRow {
                category_id: category.id,
                category_name: category.name.clone(),
                figures: Self::figures_for(category.id, input),
            })
            .collect();

        let totals = Self::totals(&rows);

        ReconciliationReport {
            fiscal_year,
            rows,
            totals,
        }
    }

    /// Figures for a single category.
    #[must_use]
    pub fn figures_for(category_id: CategoryId, input: &ReconciliationInput) -> BudgetFigures {
        BudgetFigures::compute(
            ReconciliationInput::amount(&input.proposed, category_id),
            ReconciliationInput::amount(&input.allotted, category_id),
            ReconciliationInput::amount(&input.spent, category_id),
        )
    }

    /// Sums the rows, then recomputes the derived figures from the sums.
    #[must_use]
    pub fn totals(rows: &[ReconciliationRow]) -> BudgetFigures {
        let (proposed, allotted, spent) = rows.iter().fold(
            (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            |(p, a, s), row| {
                (
                    p + row.figures.proposed,
                    a + row.figures.allotted,
                    s + row.figures.spent,
                )
            },
        );
        BudgetFigures::compute(proposed, allotted, spent)
    }

    /// Utilization percentage rounded to 2 decimal places.
    #[must_use]
    pub fn utilization(spent: Decimal, allotted: Decimal) -> Decimal {
        if allotted <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let mut pct = (spent / allotted * Decimal::ONE_HUNDRED).round_dp(2);
        pct.rescale(2);
        pct
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn category(name: &str) -> CategoryRef {
        CategoryRef {
            id: CategoryId::new(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_missing_amounts_are_zero() {
        let equipment = category("Equipment");
        let input = ReconciliationInput {
            categories: vec![equipment.clone()],
            ..Default::default()
        };

        let report = ReconciliationEngine::reconcile(FiscalYear::starting(2024), &input);

        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].figures, BudgetFigures::default());
        assert_eq!(report.totals.utilization, Decimal::ZERO);
    }

    #[test]
    fn test_no_categories_gives_zero_totals() {
        let report =
            ReconciliationEngine::reconcile(FiscalYear::starting(2024), &ReconciliationInput::default());
        assert!(report.rows.is_empty());
        assert_eq!(report.totals, BudgetFigures::default());
    }

    #[test]
    fn test_row_figures() {
        let travel = category("Travel");
        let mut input = ReconciliationInput {
            categories: vec![travel.clone()],
            ..Default::default()
        };
        input.proposed.insert(travel.id, dec!(600000));
        input.allotted.insert(travel.id, dec!(500000));
        input.spent.insert(travel.id, dec!(450000));

        let figures = ReconciliationEngine::figures_for(travel.id, &input);

        assert_eq!(figures.variance, dec!(-100000));
        assert_eq!(figures.remaining, dec!(50000));
        assert_eq!(figures.utilization, dec!(90.00));
        assert_eq!(figures.utilization.to_string(), "90.00");
    }

    #[test]
    fn test_totals_recompute_utilization() {
        let a = category("A");
        let b = category("B");
        let mut input = ReconciliationInput {
            categories: vec![a.clone(), b.clone()],
            ..Default::default()
        };
        input.allotted.insert(a.id, dec!(100));
        input.spent.insert(a.id, dec!(100));
        input.allotted.insert(b.id, dec!(900));
        input.spent.insert(b.id, dec!(0));

        let report = ReconciliationEngine::reconcile(FiscalYear::starting(2024), &input);

        // Averaging the rows would give 50.00.
        assert_eq!(report.totals.utilization, dec!(10.00));
        assert_eq!(report.totals.spent, dec!(100));
        assert_eq!(report.totals.remaining, dec!(900));
    }

    #[test]
    fn test_overspent_category_goes_negative() {
        let figures = BudgetFigures::compute(dec!(0), dec!(1000), dec!(1250));
        assert_eq!(figures.remaining, dec!(-250));
        assert_eq!(figures.utilization, dec!(125.00));
    }

    #[test]
    fn test_utilization_rounds_to_two_places() {
        assert_eq!(
            ReconciliationEngine::utilization(dec!(1), dec!(3)),
            dec!(33.33)
        );
        assert_eq!(
            ReconciliationEngine::utilization(dec!(2), dec!(3)),
            dec!(66.67)
        );
        assert_eq!(ReconciliationEngine::utilization(dec!(500), dec!(0)), dec!(0));
    }
}
