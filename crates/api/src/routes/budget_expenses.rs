//! Flexible budget expense routes.
//!
//! Same rules as category expenses; the guard draws on the linked budget
//! instance when one is given, otherwise on the category allotment.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use uuid::Uuid;

use deptledger_core::access::Permission;
use deptledger_core::audit::{AuditAction, AuditEvent};
use deptledger_core::expense::{
    CreateBudgetExpenseInput, ExpenseQuery, ReceiptInput, StatusDecision,
};
use deptledger_db::BudgetExpenseRepository;
use deptledger_db::repositories::{ReceiptParent, ReceiptRepository};
use deptledger_shared::types::PageRequest;

use super::expenses::{UpdateCommand, UpdateExpenseRequest};
use super::{MAX_PER_PAGE, tracked};
use crate::{
    AppState,
    error::ApiResult,
    middleware::{AuthUser, Client},
};

/// Creates the budget expense routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/budget-expenses",
            get(list_expenses).post(create_expense),
        )
        .route(
            "/budget-expenses/{id}",
            get(get_expense).put(update_expense).delete(delete_expense),
        )
        .route(
            "/budget-expenses/{id}/receipts",
            get(list_receipts).post(attach_receipt),
        )
}

/// GET `/budget-expenses`
async fn list_expenses(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<ExpenseQuery>,
    Query(page): Query<PageRequest>,
) -> ApiResult<impl IntoResponse> {
    actor.require(Permission::Read)?;
    let predicates = query.into_predicates()?;

    let expenses = BudgetExpenseRepository::new(state.conn())
        .list(actor.department_id, &predicates, page.clamped(MAX_PER_PAGE))
        .await?;
    Ok(Json(expenses))
}

/// GET `/budget-expenses/{id}`
async fn get_expense(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    actor.require(Permission::Read)?;
    let detail = BudgetExpenseRepository::new(state.conn())
        .find(actor.department_id, id)
        .await?;
    Ok(Json(detail))
}

/// POST `/budget-expenses`
async fn create_expense(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Client(client): Client,
    Json(input): Json<CreateBudgetExpenseInput>,
) -> ApiResult<impl IntoResponse> {
    let action = AuditAction::BudgetExpenseCreate;
    let created = tracked(
        &state,
        &actor,
        &client,
        action,
        BudgetExpenseRepository::new(state.conn())
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

/// PUT `/budget-expenses/{id}`
async fn update_expense(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Client(client): Client,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateExpenseRequest>,
) -> ApiResult<impl IntoResponse> {
    let repo = BudgetExpenseRepository::new(state.conn());
    let command = tracked(
        &state,
        &actor,
        &client,
        AuditAction::BudgetExpenseUpdate,
        request.into_command(),
    )?;

    let event = match command {
        UpdateCommand::Decide(decision) => {
            let action = match decision {
                StatusDecision::Approve { .. } => AuditAction::BudgetExpenseApprove,
                StatusDecision::Reject { .. } => AuditAction::BudgetExpenseReject,
            };
            let change = tracked(
                &state,
                &actor,
                &client,
                action,
                repo.decide(&actor, id, decision).await,
            )?;
            AuditEvent::new(action, Some(id))
                .old(&change.before)
                .new_values(&change.after)
        }
        UpdateCommand::Edit(changes) => {
            let action = AuditAction::BudgetExpenseUpdate;
            let change = tracked(
                &state,
                &actor,
                &client,
                action,
                repo.update(&actor, id, changes).await,
            )?;
            AuditEvent::new(action, Some(id))
                .old(&change.before)
                .new_values(&change.after)
        }
    };
    state.record(event.by(&actor).client(client));

    let detail = repo.find(actor.department_id, id).await?;
    Ok(Json(detail))
}

/// DELETE `/budget-expenses/{id}`
async fn delete_expense(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Client(client): Client,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let action = AuditAction::BudgetExpenseDelete;
    let deleted = tracked(
        &state,
        &actor,
        &client,
        action,
        BudgetExpenseRepository::new(state.conn())
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

/// GET `/budget-expenses/{id}/receipts`
async fn list_receipts(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    actor.require(Permission::Read)?;
    let receipts = ReceiptRepository::new(state.conn())
        .list_for(actor.department_id, ReceiptParent::BudgetExpense(id))
        .await?;
    Ok(Json(serde_json::json!({ "receipts": receipts })))
}

/// POST `/budget-expenses/{id}/receipts`
async fn attach_receipt(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Client(client): Client,
    Path(id): Path<Uuid>,
    Json(input): Json<ReceiptInput>,
) -> ApiResult<impl IntoResponse> {
    super::receipts::attach(state, actor, client, ReceiptParent::BudgetExpense(id), input).await
}
