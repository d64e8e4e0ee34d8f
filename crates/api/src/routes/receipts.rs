//! Receipt metadata routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::delete,
};
use uuid::Uuid;

use deptledger_core::access::Actor;
use deptledger_core::audit::{AuditAction, AuditEvent, ClientInfo};
use deptledger_core::expense::ReceiptInput;
use deptledger_db::repositories::{ReceiptParent, ReceiptRepository};

use super::tracked;
use crate::{
    AppState,
    error::ApiResult,
    middleware::{AuthUser, Client},
};

/// Creates the receipt routes. Attaching is nested under each expense kind.
pub fn routes() -> Router<AppState> {
    Router::new().route("/receipts/{id}", delete(delete_receipt))
}

/// Attaches a receipt to `parent`; shared by both expense kinds.
pub(crate) async fn attach(
    state: AppState,
    actor: Actor,
    client: ClientInfo,
    parent: ReceiptParent,
    input: ReceiptInput,
) -> ApiResult<(StatusCode, Json<deptledger_db::entities::receipts::Model>)> {
    let action = AuditAction::ReceiptAttach;
    let receipt = tracked(
        &state,
        &actor,
        &client,
        action,
        ReceiptRepository::new(state.conn())
            .attach(&actor, parent, input)
            .await,
    )?;

    state.record(
        AuditEvent::new(action, Some(receipt.id))
            .by(&actor)
            .new_values(&receipt)
            .client(client),
    );
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// DELETE `/receipts/{id}`
async fn delete_receipt(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Client(client): Client,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let action = AuditAction::ReceiptDelete;
    let receipt = tracked(
        &state,
        &actor,
        &client,
        action,
        ReceiptRepository::new(state.conn())
            .delete(&actor, id)
            .await,
    )?;

    state.record(
        AuditEvent::new(action, Some(id))
            .by(&actor)
            .old(&receipt)
            .client(client),
    );
    Ok(StatusCode::NO_CONTENT)
}
