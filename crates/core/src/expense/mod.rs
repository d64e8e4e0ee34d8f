//! Expense lifecycle for both the category-bound and flexible models.
//!
//! # Modules
//!
//! - `types` - Expense domain types (ExpenseStatus, ExpenseAction, inputs)
//! - `error` - Expense-specific error types
//! - `state_machine` - Approval transitions and ownership rules
//! - `filter` - Composable listing predicates

pub mod error;
pub mod filter;
pub mod state_machine;
pub mod types;

#[cfg(test)]
mod state_machine_props;

pub use error::ExpenseError;
pub use filter::{ExpensePredicate, ExpenseQuery};
pub use state_machine::ApprovalStateMachine;
pub use types::{
    CreateBudgetExpenseInput, CreateExpenseInput, ExpenseAction, ExpenseChanges, ExpenseKind,
    ExpenseSnapshot, ExpenseStatus, ReceiptInput, StatusDecision,
};
