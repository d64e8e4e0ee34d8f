//! Category budget routes: plans, allotments and the reconciliation report.

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use serde_json::json;

use deptledger_core::access::Permission;
use deptledger_core::audit::{AuditAction, AuditEvent};
use deptledger_core::budget::{UpsertAllotmentInput, UpsertBudgetPlanInput};
use deptledger_core::fiscal::FiscalYear;
use deptledger_db::{BudgetRepository, FiscalYearRepository, ReconciliationRepository};

use super::tracked;
use crate::{
    AppState,
    error::ApiResult,
    middleware::{AuthUser, Client},
};

/// Creates the budget routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/budgets", get(reconciliation_report).post(upsert_plan))
        .route("/budgets/plans", get(list_plans))
        .route(
            "/budgets/allotments",
            get(list_allotments).post(upsert_allotment),
        )
}

/// Optional `?fiscal_year=YYYY-YY`; defaults to the department's active year.
#[derive(Debug, Default, Deserialize)]
pub struct FiscalYearQuery {
    /// Requested fiscal year.
    pub fiscal_year: Option<FiscalYear>,
}

/// GET `/budgets` - Plan vs allotment vs spend for every active category.
async fn reconciliation_report(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<FiscalYearQuery>,
) -> ApiResult<impl IntoResponse> {
    actor.require(Permission::ViewReports)?;

    let fiscal_year = FiscalYearRepository::new(state.conn())
        .resolve(actor.department_id, query.fiscal_year)
        .await?;
    let report = ReconciliationRepository::new(state.conn())
        .report(actor.department_id, fiscal_year)
        .await?;

    Ok(Json(json!({
        "fiscal_year": report.fiscal_year,
        "currency": state.ledger.currency,
        "budgets": report.rows,
        "totals": report.totals,
    })))
}

/// GET `/budgets/plans`
async fn list_plans(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<FiscalYearQuery>,
) -> ApiResult<impl IntoResponse> {
    actor.require(Permission::ViewReports)?;

    let fiscal_year = FiscalYearRepository::new(state.conn())
        .resolve(actor.department_id, query.fiscal_year)
        .await?;
    let plans = BudgetRepository::new(state.conn())
        .list_plans(actor.department_id, fiscal_year)
        .await?;

    Ok(Json(json!({ "fiscal_year": fiscal_year, "plans": plans })))
}

/// GET `/budgets/allotments`
async fn list_allotments(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<FiscalYearQuery>,
) -> ApiResult<impl IntoResponse> {
    actor.require(Permission::ViewReports)?;

    let fiscal_year = FiscalYearRepository::new(state.conn())
        .resolve(actor.department_id, query.fiscal_year)
        .await?;
    let allotments = BudgetRepository::new(state.conn())
        .list_allotments(actor.department_id, fiscal_year)
        .await?;

    Ok(Json(
        json!({ "fiscal_year": fiscal_year, "allotments": allotments }),
    ))
}

/// POST `/budgets` - Create or replace the plan for a category and year.
async fn upsert_plan(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Client(client): Client,
    Json(input): Json<UpsertBudgetPlanInput>,
) -> ApiResult<impl IntoResponse> {
    let action = AuditAction::BudgetPlanUpsert;
    let change = tracked(
        &state,
        &actor,
        &client,
        action,
        BudgetRepository::new(state.conn())
            .upsert_plan(&actor, input)
            .await,
    )?;

    state.record(
        AuditEvent::new(action, Some(change.after.id))
            .by(&actor)
            .old(&change.before)
            .new_values(&change.after)
            .client(client),
    );
    Ok(Json(change.after))
}

/// POST `/budgets/allotments` - Create or replace the allotment for a
/// category and year.
async fn upsert_allotment(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Client(client): Client,
    Json(input): Json<UpsertAllotmentInput>,
) -> ApiResult<impl IntoResponse> {
    let action = AuditAction::BudgetAllotmentUpsert;
    let change = tracked(
        &state,
        &actor,
        &client,
        action,
        BudgetRepository::new(state.conn())
            .upsert_allotment(&actor, input)
            .await,
    )?;

    state.record(
        AuditEvent::new(action, Some(change.after.id))
            .by(&actor)
            .old(&change.before)
            .new_values(&change.after)
            .client(client),
    );
    Ok(Json(change.after))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fiscal_year_query_parses_label() {
        let query: FiscalYearQuery =
            serde_json::from_value(json!({ "fiscal_year": "2024-25" })).unwrap();
        assert_eq!(query.fiscal_year, Some(FiscalYear::starting(2024)));

        let empty: FiscalYearQuery = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.fiscal_year, None);

        assert!(serde_json::from_value::<FiscalYearQuery>(json!({ "fiscal_year": "2024" })).is_err());
    }
}
