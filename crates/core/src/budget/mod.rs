//! Budget planning, allotment, reconciliation and availability.

pub mod amount;
pub mod error;
pub mod flexible;
pub mod guard;
pub mod reconciliation;
pub mod types;

#[cfg(test)]
mod tests;

pub use amount::ensure_storable;
pub use error::BudgetError;
pub use flexible::{BreakdownItem, BudgetInstanceSummary, validate_breakdown};
pub use guard::{Admission, AvailabilityGuard};
pub use reconciliation::{
    BudgetFigures, CategoryRef, ReconciliationEngine, ReconciliationInput, ReconciliationReport,
    ReconciliationRow,
};
pub use types::{
    BudgetRef, CreateCategoryInput, CreateFlexibleBudgetInput, PlanStatus,
    UpdateCategoryInput, UpdateFlexibleBudgetInput, UpsertAllotmentInput, UpsertBudgetPlanInput,
};
