//! Active fiscal year routes.

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use serde_json::json;

use deptledger_core::access::Permission;
use deptledger_core::audit::{AuditAction, AuditEvent};
use deptledger_core::fiscal::FiscalYear;
use deptledger_db::FiscalYearRepository;

use super::tracked;
use crate::{
    AppState,
    error::ApiResult,
    middleware::{AuthUser, Client},
};

/// Creates the fiscal year routes.
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/fiscal-years/active",
        get(get_active).put(activate),
    )
}

/// Body of `PUT /fiscal-years/active`.
#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    /// Fiscal year label, e.g. `2024-25`.
    pub fiscal_year: FiscalYear,
}

/// GET `/fiscal-years/active`
async fn get_active(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> ApiResult<impl IntoResponse> {
    actor.require(Permission::Read)?;
    let active = FiscalYearRepository::new(state.conn())
        .active(actor.department_id)
        .await?;
    Ok(Json(json!({
        "active": active,
        "current": FiscalYear::current(),
    })))
}

/// PUT `/fiscal-years/active` - Makes one fiscal year the department default.
async fn activate(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Client(client): Client,
    Json(request): Json<ActivateRequest>,
) -> ApiResult<impl IntoResponse> {
    let action = AuditAction::FiscalYearActivate;
    let change = tracked(
        &state,
        &actor,
        &client,
        action,
        FiscalYearRepository::new(state.conn())
            .activate(&actor, request.fiscal_year)
            .await,
    )?;

    state.record(
        AuditEvent::new(action, None)
            .by(&actor)
            .old(json!({ "fiscal_year": change.before }))
            .new_values(json!({ "fiscal_year": change.after }))
            .client(client),
    );
    Ok(Json(json!({ "active": change.after })))
}
