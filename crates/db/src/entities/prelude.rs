//! Entity re-exports.

pub use super::audit_logs::Entity as AuditLogs;
pub use super::budget_allotments::Entity as BudgetAllotments;
pub use super::budget_breakdowns::Entity as BudgetBreakdowns;
pub use super::budget_expense_breakdowns::Entity as BudgetExpenseBreakdowns;
pub use super::budget_expenses::Entity as BudgetExpenses;
pub use super::budget_plans::Entity as BudgetPlans;
pub use super::budgets::Entity as Budgets;
pub use super::categories::Entity as Categories;
pub use super::department_fiscal_years::Entity as DepartmentFiscalYears;
pub use super::departments::Entity as Departments;
pub use super::expenses::Entity as Expenses;
pub use super::receipts::Entity as Receipts;
pub use super::users::Entity as Users;
