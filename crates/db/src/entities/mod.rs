//! `SeaORM` entity definitions.

pub mod prelude;

pub mod audit_logs;
pub mod budget_allotments;
pub mod budget_breakdowns;
pub mod budget_expense_breakdowns;
pub mod budget_expenses;
pub mod budget_plans;
pub mod budgets;
pub mod categories;
pub mod department_fiscal_years;
pub mod departments;
pub mod expenses;
pub mod receipts;
pub mod sea_orm_active_enums;
pub mod users;
