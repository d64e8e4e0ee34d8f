//! Category-bound expense routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use deptledger_core::access::Permission;
use deptledger_core::audit::{AuditAction, AuditEvent};
use deptledger_core::budget::BreakdownItem;
use deptledger_core::expense::{
    CreateExpenseInput, ExpenseChanges, ExpenseError, ExpenseQuery, ReceiptInput, StatusDecision,
};
use deptledger_db::ExpenseRepository;
use deptledger_db::repositories::{ReceiptParent, ReceiptRepository};
use deptledger_shared::types::{CategoryId, PageRequest};

use super::{MAX_PER_PAGE, tracked};
use crate::{
    AppState,
    error::ApiResult,
    middleware::{AuthUser, Client},
};

/// Creates the expense routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/expenses", get(list_expenses).post(create_expense))
        .route(
            "/expenses/{id}",
            get(get_expense).put(update_expense).delete(delete_expense),
        )
        .route(
            "/expenses/{id}/receipts",
            get(list_receipts).post(attach_receipt),
        )
}

// ============================================================================
// Request Types
// ============================================================================

/// Body of `PUT /expenses/{id}` and `PUT /budget-expenses/{id}`.
///
/// A `status` of `approved` or `rejected` is a decision and may only be sent
/// with the decision's own fields; everything else is a field update.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateExpenseRequest {
    /// Requested decision.
    pub status: Option<String>,
    /// Approver notes.
    pub approval_notes: Option<String>,
    /// Reason, required to reject.
    pub rejection_reason: Option<String>,
    /// New category.
    pub category_id: Option<CategoryId>,
    /// New vendor.
    pub vendor: Option<String>,
    /// New amount.
    pub amount: Option<Decimal>,
    /// New date.
    pub expense_date: Option<NaiveDate>,
    /// New description.
    pub description: Option<String>,
    /// Replacement breakdown.
    pub breakdown: Option<Vec<BreakdownItem>>,
}

/// What an update request asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateCommand {
    /// Approve or reject.
    Decide(StatusDecision),
    /// Edit fields.
    Edit(ExpenseChanges),
}

impl UpdateExpenseRequest {
    /// Splits the request into a decision or a field update.
    ///
    /// # Errors
    ///
    /// Returns `ExpenseError::StatusNotEditable` when a status is sent along
    /// with field changes, or a validation error for an unknown status or an
    /// empty body.
    pub fn into_command(self) -> Result<UpdateCommand, ExpenseError> {
        let changes = ExpenseChanges {
            category_id: self.category_id,
            vendor: self.vendor,
            amount: self.amount,
            expense_date: self.expense_date,
            description: self.description,
            breakdown: self.breakdown,
        };

        match self.status {
            Some(_) if !changes.is_empty() => Err(ExpenseError::StatusNotEditable),
            Some(status) => StatusDecision::from_request(
                &status,
                self.approval_notes,
                self.rejection_reason,
            )
            .map(UpdateCommand::Decide),
            None if changes.is_empty() => {
                Err(ExpenseError::Validation("no fields to update".to_string()))
            }
            None => Ok(UpdateCommand::Edit(changes)),
        }
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/expenses` - Filtered, newest-first page of expenses.
async fn list_expenses(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<ExpenseQuery>,
    Query(page): Query<PageRequest>,
) -> ApiResult<impl IntoResponse> {
    actor.require(Permission::Read)?;
    let predicates = query.into_predicates()?;

    let expenses = ExpenseRepository::new(state.conn())
        .list(actor.department_id, &predicates, page.clamped(MAX_PER_PAGE))
        .await?;
    Ok(Json(expenses))
}

/// GET `/expenses/{id}`
async fn get_expense(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    actor.require(Permission::Read)?;
    let expense = ExpenseRepository::new(state.conn())
        .find(actor.department_id, id)
        .await?;
    Ok(Json(expense))
}

/// POST `/expenses` - Checks availability, then records a pending expense.
async fn create_expense(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Client(client): Client,
    Json(input): Json<CreateExpenseInput>,
) -> ApiResult<impl IntoResponse> {
    let action = AuditAction::ExpenseCreate;
    let created = tracked(
        &state,
        &actor,
        &client,
        action,
        ExpenseRepository::new(state.conn())
            .create(&actor, input)
            .await,
    )?;

    state.record(
        AuditEvent::new(action, Some(created.expense.id))
            .by(&actor)
            .new_values(&created)
            .client(client),
    );
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT `/expenses/{id}` - Approve, reject or edit.
async fn update_expense(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Client(client): Client,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateExpenseRequest>,
) -> ApiResult<impl IntoResponse> {
    let repo = ExpenseRepository::new(state.conn());
    let command = tracked(
        &state,
        &actor,
        &client,
        AuditAction::ExpenseUpdate,
        request.into_command(),
    )?;

    let (action, change) = match command {
        UpdateCommand::Decide(decision) => {
            let action = match decision {
                StatusDecision::Approve { .. } => AuditAction::ExpenseApprove,
                StatusDecision::Reject { .. } => AuditAction::ExpenseReject,
            };
            let change = tracked(
                &state,
                &actor,
                &client,
                action,
                repo.decide(&actor, id, decision).await,
            )?;
            (action, change)
        }
        UpdateCommand::Edit(changes) => {
            let action = AuditAction::ExpenseUpdate;
            let change = tracked(
                &state,
                &actor,
                &client,
                action,
                repo.update(&actor, id, changes).await,
            )?;
            (action, change)
        }
    };

    state.record(
        AuditEvent::new(action, Some(id))
            .by(&actor)
            .old(&change.before)
            .new_values(&change.after)
            .client(client),
    );
    Ok(Json(change.after))
}

/// DELETE `/expenses/{id}` - Removes the expense and its receipts.
async fn delete_expense(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Client(client): Client,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let action = AuditAction::ExpenseDelete;
    let deleted = tracked(
        &state,
        &actor,
        &client,
        action,
        ExpenseRepository::new(state.conn())
            .delete(&actor, id)
            .await,
    )?;

    state.record(
        AuditEvent::new(action, Some(id))
            .by(&actor)
            .old(&deleted)
            .client(client),
    );
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/expenses/{id}/receipts`
async fn list_receipts(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    actor.require(Permission::Read)?;
    let receipts = ReceiptRepository::new(state.conn())
        .list_for(actor.department_id, ReceiptParent::Expense(id))
        .await?;
    Ok(Json(serde_json::json!({ "receipts": receipts })))
}

/// POST `/expenses/{id}/receipts`
async fn attach_receipt(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Client(client): Client,
    Path(id): Path<Uuid>,
    Json(input): Json<ReceiptInput>,
) -> ApiResult<impl IntoResponse> {
    super::receipts::attach(state, actor, client, ReceiptParent::Expense(id), input).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn request(body: serde_json::Value) -> UpdateExpenseRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_status_routes_to_decision() {
        let command = request(json!({ "status": "approved", "approval_notes": "ok" }))
            .into_command()
            .unwrap();
        assert_eq!(
            command,
            UpdateCommand::Decide(StatusDecision::Approve {
                notes: Some("ok".into())
            })
        );

        let command = request(json!({ "status": "rejected" })).into_command().unwrap();
        assert_eq!(
            command,
            UpdateCommand::Decide(StatusDecision::Reject { reason: None })
        );
    }

    #[test]
    fn test_fields_route_to_edit() {
        let command = request(json!({ "amount": "1000.00", "vendor": "Acme" }))
            .into_command()
            .unwrap();
        let UpdateCommand::Edit(changes) = command else {
            panic!("expected a field update");
        };
        assert_eq!(changes.amount, Some(dec!(1000.00)));
        assert_eq!(changes.vendor.as_deref(), Some("Acme"));
        assert!(changes.affects_spend());
    }

    #[test]
    fn test_status_mixed_with_fields_is_refused() {
        let err = request(json!({ "status": "approved", "amount": "5" }))
            .into_command()
            .unwrap_err();
        assert_eq!(err, ExpenseError::StatusNotEditable);
    }

    #[test]
    fn test_empty_update_is_refused() {
        let err = request(json!({})).into_command().unwrap_err();
        assert_eq!(err, ExpenseError::Validation("no fields to update".into()));
        assert_eq!(err.status_code(), 400);

        let err = request(json!({ "approval_notes": "ignored" }))
            .into_command()
            .unwrap_err();
        assert!(matches!(err, ExpenseError::Validation(_)));
    }

    #[test]
    fn test_unknown_status_is_invalid() {
        let err = request(json!({ "status": "pending" }))
            .into_command()
            .unwrap_err();
        assert!(matches!(err, ExpenseError::Validation(_)));
    }
}
