//! Audit trail query route.

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
};

use deptledger_core::access::Permission;
use deptledger_core::audit::AuditQuery;
use deptledger_db::AuditLogRepository;
use deptledger_shared::types::PageRequest;

use super::MAX_PER_PAGE;
use crate::{AppState, error::ApiResult, middleware::AuthUser};

/// Creates the audit log routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/audit-logs", get(query_audit_logs))
}

/// GET `/audit-logs` - Newest-first page of the department's trail.
/// Admins also see anonymous authentication denials.
async fn query_audit_logs(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(filter): Query<AuditQuery>,
    Query(page): Query<PageRequest>,
) -> ApiResult<impl IntoResponse> {
    actor.require(Permission::ViewReports)?;

    let logs = AuditLogRepository::new(state.conn())
        .query(&actor, filter, page.clamped(MAX_PER_PAGE))
        .await?;
    Ok(Json(logs))
}
