//! Translates expense predicates into SeaORM conditions.
//!
//! Every condition is scoped to the caller's department and AND-combines
//! the predicates; values are bound as parameters.

use sea_orm::sea_query::{Expr, Func};
use sea_orm::{ColumnTrait, Condition};

use deptledger_core::expense::ExpensePredicate;
use deptledger_shared::types::DepartmentId;
use deptledger_shared::{AppError, AppResult};

use super::common::escape_like;
use crate::entities::sea_orm_active_enums::ExpenseStatus;

macro_rules! expense_condition_fn {
    ($(#[$meta:meta])* $name:ident, $entity:ident, budget($id:ident) => $budget:expr) => {
        $(#[$meta])*
        pub(crate) fn $name(
            department_id: DepartmentId,
            predicates: &[ExpensePredicate],
        ) -> AppResult<Condition> {
            use crate::entities::$entity::{Column, Entity};

            let mut condition =
                Condition::all().add(Column::DepartmentId.eq(department_id.into_inner()));

            for predicate in predicates {
                condition = condition.add(match predicate {
                    ExpensePredicate::Status(status) => {
                        Column::Status.eq(ExpenseStatus::from(*status))
                    }
                    ExpensePredicate::Category(id) => Column::CategoryId.eq(id.into_inner()),
                    ExpensePredicate::Budget($id) => $budget,
                    ExpensePredicate::CreatedBy(id) => Column::CreatedBy.eq(id.into_inner()),
                    ExpensePredicate::VendorContains(text) => {
                        let pattern = format!("%{}%", escape_like(&text.to_lowercase()));
                        Expr::expr(Func::lower(Expr::col((Entity, Column::Vendor))))
                            .like(pattern)
                    }
                    ExpensePredicate::DateFrom(date) => Column::ExpenseDate.gte(*date),
                    ExpensePredicate::DateTo(date) => Column::ExpenseDate.lte(*date),
                    ExpensePredicate::FiscalYear(fy) => {
                        Column::ExpenseDate.between(fy.start_date(), fy.end_date())
                    }
                    ExpensePredicate::AmountMin(amount) => Column::Amount.gte(*amount),
                    ExpensePredicate::AmountMax(amount) => Column::Amount.lte(*amount),
                });
            }

            Ok(condition)
        }
    };
}

expense_condition_fn!(
    /// Condition over category-bound expenses. These never reference a
    /// budget instance, so a budget predicate is rejected.
    expense_condition,
    expenses,
    budget(_id) => {
        return Err(AppError::Validation(
            "budget_id filter applies to budget expenses only".to_string(),
        ));
    }
);

expense_condition_fn!(
    /// Condition over flexible budget expenses.
    budget_expense_condition,
    budget_expenses,
    budget(id) => Column::BudgetId.eq(*id)
);
