//! Flexible budget instance routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde_json::json;
use uuid::Uuid;

use deptledger_core::access::Permission;
use deptledger_core::audit::{AuditAction, AuditEvent};
use deptledger_core::budget::{CreateFlexibleBudgetInput, UpdateFlexibleBudgetInput};
use deptledger_db::{FiscalYearRepository, FlexibleBudgetRepository};

use super::budgets::FiscalYearQuery;
use super::tracked;
use crate::{
    AppState,
    error::ApiResult,
    middleware::{AuthUser, Client},
};

/// Creates the flexible budget routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/flex-budgets", get(list_budgets).post(create_budget))
        .route(
            "/flex-budgets/{id}",
            get(get_budget).put(update_budget).delete(delete_budget),
        )
}

/// GET `/flex-budgets` - Budget instances with their summaries.
async fn list_budgets(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<FiscalYearQuery>,
) -> ApiResult<impl IntoResponse> {
    actor.require(Permission::ViewReports)?;

    let fiscal_year = FiscalYearRepository::new(state.conn())
        .resolve(actor.department_id, query.fiscal_year)
        .await?;
    let budgets = FlexibleBudgetRepository::new(state.conn())
        .list(actor.department_id, fiscal_year)
        .await?;

    Ok(Json(json!({
        "fiscal_year": fiscal_year,
        "currency": state.ledger.currency,
        "budgets": budgets,
    })))
}

/// GET `/flex-budgets/{id}`
async fn get_budget(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    actor.require(Permission::ViewReports)?;
    let budget = FlexibleBudgetRepository::new(state.conn())
        .get(actor.department_id, id)
        .await?;
    Ok(Json(budget))
}

/// POST `/flex-budgets` - Creates a budget with its breakdown.
async fn create_budget(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Client(client): Client,
    Json(input): Json<CreateFlexibleBudgetInput>,
) -> ApiResult<impl IntoResponse> {
    let action = AuditAction::BudgetCreate;
    let created = tracked(
        &state,
        &actor,
        &client,
        action,
        FlexibleBudgetRepository::new(state.conn())
            .create(&actor, input)
            .await,
    )?;

    state.record(
        AuditEvent::new(action, Some(created.budget.id))
            .by(&actor)
            .new_values(&created)
            .client(client),
    );
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT `/flex-budgets/{id}` - Updates fields; a breakdown replaces the old one.
async fn update_budget(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Client(client): Client,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateFlexibleBudgetInput>,
) -> ApiResult<impl IntoResponse> {
    let action = AuditAction::BudgetUpdate;
    let change = tracked(
        &state,
        &actor,
        &client,
        action,
        FlexibleBudgetRepository::new(state.conn())
            .update(&actor, id, input)
            .await,
    )?;

    state.record(
        AuditEvent::new(action, Some(id))
            .by(&actor)
            .old(&change.before)
            .new_values(&change.after)
            .client(client),
    );
    Ok(Json(change.after))
}

/// DELETE `/flex-budgets/{id}` - Refused while expenses reference the budget.
async fn delete_budget(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Client(client): Client,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let action = AuditAction::BudgetDelete;
    let deleted = tracked(
        &state,
        &actor,
        &client,
        action,
        FlexibleBudgetRepository::new(state.conn())
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
