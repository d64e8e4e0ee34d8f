//! Repository layer for database operations.

pub mod audit_log;
pub mod budget;
pub mod budget_expense;
pub mod category;
pub mod common;
pub mod department;
pub mod expense;
pub mod filter;
pub mod fiscal_year;
pub mod flexible;
pub mod receipt;
pub mod reconciliation;
pub mod user;

pub use audit_log::AuditLogRepository;
pub use budget::BudgetRepository;
pub use budget_expense::{BudgetExpenseDetail, BudgetExpenseRepository};
pub use category::CategoryRepository;
pub use common::Change;
pub use department::DepartmentRepository;
pub use expense::{ExpenseRepository, ExpenseWithReceipts};
pub use fiscal_year::FiscalYearRepository;
pub use flexible::{BudgetWithSummary, FlexibleBudgetRepository};
pub use receipt::{ReceiptParent, ReceiptRepository};
pub use reconciliation::ReconciliationRepository;
pub use user::{CreateUser, UserRepository, actor_of};
