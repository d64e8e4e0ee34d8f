//! Category routes. Categories are shared by every department.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use deptledger_core::access::Permission;
use deptledger_core::audit::{AuditAction, AuditEvent};
use deptledger_core::budget::{CreateCategoryInput, UpdateCategoryInput};
use deptledger_db::CategoryRepository;

use super::tracked;
use crate::{
    AppState,
    error::ApiResult,
    middleware::{AuthUser, Client},
};

/// Creates the category routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/{id}", put(update_category))
}

/// Query parameters for listing categories.
#[derive(Debug, Default, Deserialize)]
pub struct ListCategoriesQuery {
    /// Include deactivated categories.
    #[serde(default)]
    pub include_inactive: bool,
}

/// GET `/categories`
async fn list_categories(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<ListCategoriesQuery>,
) -> ApiResult<impl IntoResponse> {
    actor.require(Permission::Read)?;
    let categories = CategoryRepository::new(state.conn())
        .list(query.include_inactive)
        .await?;
    Ok(Json(json!({ "categories": categories })))
}

/// POST `/categories`
async fn create_category(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Client(client): Client,
    Json(input): Json<CreateCategoryInput>,
) -> ApiResult<impl IntoResponse> {
    let action = AuditAction::CategoryCreate;
    tracked(
        &state,
        &actor,
        &client,
        action,
        actor.require(Permission::ManageBudgets),
    )?;
    let category = tracked(
        &state,
        &actor,
        &client,
        action,
        CategoryRepository::new(state.conn()).create(input).await,
    )?;

    state.record(
        AuditEvent::new(action, Some(category.id))
            .by(&actor)
            .new_values(&category)
            .client(client),
    );
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT `/categories/{id}`
async fn update_category(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Client(client): Client,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateCategoryInput>,
) -> ApiResult<impl IntoResponse> {
    let action = AuditAction::CategoryUpdate;
    tracked(
        &state,
        &actor,
        &client,
        action,
        actor.require(Permission::ManageBudgets),
    )?;
    let change = tracked(
        &state,
        &actor,
        &client,
        action,
        CategoryRepository::new(state.conn()).update(id, input).await,
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
