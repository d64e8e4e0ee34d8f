//! Audit events and query filters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use deptledger_shared::types::{DepartmentId, UserId};

use crate::access::Actor;

/// Every action the trail records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    /// `category.create`
    #[serde(rename = "category.create")]
    CategoryCreate,
    /// `category.update`
    #[serde(rename = "category.update")]
    CategoryUpdate,
    /// `budget_plan.upsert`
    #[serde(rename = "budget_plan.upsert")]
    BudgetPlanUpsert,
    /// `budget_allotment.upsert`
    #[serde(rename = "budget_allotment.upsert")]
    BudgetAllotmentUpsert,
    /// `expense.create`
    #[serde(rename = "expense.create")]
    ExpenseCreate,
    /// `expense.update`
    #[serde(rename = "expense.update")]
    ExpenseUpdate,
    /// `expense.approve`
    #[serde(rename = "expense.approve")]
    ExpenseApprove,
    /// `expense.reject`
    #[serde(rename = "expense.reject")]
    ExpenseReject,
    /// `expense.delete`
    #[serde(rename = "expense.delete")]
    ExpenseDelete,
    /// `budget.create`
    #[serde(rename = "budget.create")]
    BudgetCreate,
    /// `budget.update`
    #[serde(rename = "budget.update")]
    BudgetUpdate,
    /// `budget.delete`
    #[serde(rename = "budget.delete")]
    BudgetDelete,
    /// `budget_expense.create`
    #[serde(rename = "budget_expense.create")]
    BudgetExpenseCreate,
    /// `budget_expense.update`
    #[serde(rename = "budget_expense.update")]
    BudgetExpenseUpdate,
    /// `budget_expense.approve`
    #[serde(rename = "budget_expense.approve")]
    BudgetExpenseApprove,
    /// `budget_expense.reject`
    #[serde(rename = "budget_expense.reject")]
    BudgetExpenseReject,
    /// `budget_expense.delete`
    #[serde(rename = "budget_expense.delete")]
    BudgetExpenseDelete,
    /// `receipt.attach`
    #[serde(rename = "receipt.attach")]
    ReceiptAttach,
    /// `receipt.delete`
    #[serde(rename = "receipt.delete")]
    ReceiptDelete,
    /// `fiscal_year.activate`
    #[serde(rename = "fiscal_year.activate")]
    FiscalYearActivate,
    /// `auth.denied`
    #[serde(rename = "auth.denied")]
    AuthDenied,
}

impl AuditAction {
    /// All actions, in tag order.
    pub const ALL: [Self; 21] = [
        Self::CategoryCreate,
        Self::CategoryUpdate,
        Self::BudgetPlanUpsert,
        Self::BudgetAllotmentUpsert,
        Self::ExpenseCreate,
        Self::ExpenseUpdate,
        Self::ExpenseApprove,
        Self::ExpenseReject,
        Self::ExpenseDelete,
        Self::BudgetCreate,
        Self::BudgetUpdate,
        Self::BudgetDelete,
        Self::BudgetExpenseCreate,
        Self::BudgetExpenseUpdate,
        Self::BudgetExpenseApprove,
        Self::BudgetExpenseReject,
        Self::BudgetExpenseDelete,
        Self::ReceiptAttach,
        Self::ReceiptDelete,
        Self::FiscalYearActivate,
        Self::AuthDenied,
    ];

    /// Returns the stored action tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CategoryCreate => "category.create",
            Self::CategoryUpdate => "category.update",
            Self::BudgetPlanUpsert => "budget_plan.upsert",
            Self::BudgetAllotmentUpsert => "budget_allotment.upsert",
            Self::ExpenseCreate => "expense.create",
            Self::ExpenseUpdate => "expense.update",
            Self::ExpenseApprove => "expense.approve",
            Self::ExpenseReject => "expense.reject",
            Self::ExpenseDelete => "expense.delete",
            Self::BudgetCreate => "budget.create",
            Self::BudgetUpdate => "budget.update",
            Self::BudgetDelete => "budget.delete",
            Self::BudgetExpenseCreate => "budget_expense.create",
            Self::BudgetExpenseUpdate => "budget_expense.update",
            Self::BudgetExpenseApprove => "budget_expense.approve",
            Self::BudgetExpenseReject => "budget_expense.reject",
            Self::BudgetExpenseDelete => "budget_expense.delete",
            Self::ReceiptAttach => "receipt.attach",
            Self::ReceiptDelete => "receipt.delete",
            Self::FiscalYearActivate => "fiscal_year.activate",
            Self::AuthDenied => "auth.denied",
        }
    }

    /// Parses a stored action tag.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == s)
    }

    /// Entity type the action applies to; the part of the tag before the dot.
    #[must_use]
    pub fn entity_type(&self) -> &'static str {
        let tag = self.as_str();
        tag.split_once('.').map_or(tag, |(entity, _)| entity)
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client metadata captured with each event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Remote address.
    pub ip_address: Option<String>,
    /// `User-Agent` header.
    pub user_agent: Option<String>,
}

/// A state change to be appended to the trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Acting user, absent for system actions.
    pub actor_id: Option<UserId>,
    /// Department the change belongs to.
    pub department_id: Option<DepartmentId>,
    /// Action tag.
    pub action: AuditAction,
    /// Entity type, e.g. `expense`.
    pub entity_type: String,
    /// Entity ID, if the entity has one.
    pub entity_id: Option<Uuid>,
    /// State before the change.
    pub old_values: Option<Value>,
    /// State after the change.
    pub new_values: Option<Value>,
    /// Client metadata.
    pub client: ClientInfo,
    /// When the change happened.
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    /// Starts an event for `action` on the given entity.
    #[must_use]
    pub fn new(action: AuditAction, entity_id: Option<Uuid>) -> Self {
        Self {
            actor_id: None,
            department_id: None,
            action,
            entity_type: action.entity_type().to_string(),
            entity_id,
            old_values: None,
            new_values: None,
            client: ClientInfo::default(),
            occurred_at: Utc::now(),
        }
    }

    /// Records the acting user and their department.
    #[must_use]
    pub fn by(mut self, actor: &Actor) -> Self {
        self.actor_id = Some(actor.user_id);
        self.department_id = Some(actor.department_id);
        self
    }

    /// Before-state.
    #[must_use]
    pub fn old(mut self, value: impl Serialize) -> Self {
        self.old_values = serde_json::to_value(value).ok();
        self
    }

    /// After-state.
    #[must_use]
    pub fn new_values(mut self, value: impl Serialize) -> Self {
        self.new_values = serde_json::to_value(value).ok();
        self
    }

    /// Client metadata.
    #[must_use]
    pub fn client(mut self, client: ClientInfo) -> Self {
        self.client = client;
        self
    }
}

/// Filter for reading the trail. All fields are optional and AND-combined.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    /// Acting user.
    pub actor_id: Option<UserId>,
    /// Entity type.
    pub entity_type: Option<String>,
    /// Entity ID.
    pub entity_id: Option<Uuid>,
    /// Action tag.
    pub action: Option<String>,
    /// Earliest timestamp, inclusive.
    pub from: Option<DateTime<Utc>>,
    /// Latest timestamp, inclusive.
    pub to: Option<DateTime<Utc>>,
}
