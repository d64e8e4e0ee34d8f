//! Category repository.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, SqlErr,
};
use uuid::Uuid;

use deptledger_core::budget::{BudgetError, CreateCategoryInput, UpdateCategoryInput};
use deptledger_shared::types::CategoryId;
use deptledger_shared::{AppError, AppResult};

use super::common::{Change, db_err};
use crate::entities::categories;

/// Loads a category that can still receive plans and expenses.
pub(crate) async fn ensure_active<C: ConnectionTrait>(
    conn: &C,
    category_id: CategoryId,
) -> AppResult<categories::Model> {
    let id = category_id.into_inner();
    let category = categories::Entity::find_by_id(id)
        .one(conn)
        .await
        .map_err(db_err)?
        .ok_or(BudgetError::CategoryNotFound(id))?;

    if !category.is_active {
        return Err(BudgetError::CategoryInactive(id).into());
    }
    Ok(category)
}

fn map_unique(err: DbErr) -> AppError {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        AppError::Validation("A category with this name already exists".to_string())
    } else {
        db_err(err)
    }
}

/// Category repository.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    db: DatabaseConnection,
}

impl CategoryRepository {
    /// Creates a new category repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Lists categories by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self, include_inactive: bool) -> AppResult<Vec<categories::Model>> {
        let mut query = categories::Entity::find().order_by_asc(categories::Column::Name);
        if !include_inactive {
            query = query.filter(categories::Column::IsActive.eq(true));
        }
        query.all(&self.db).await.map_err(db_err)
    }

    /// Gets a category by ID.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the category does not exist.
    pub async fn find(&self, id: Uuid) -> AppResult<categories::Model> {
        categories::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or_else(|| BudgetError::CategoryNotFound(id).into())
    }

    /// Creates a category.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank or duplicate name.
    pub async fn create(&self, input: CreateCategoryInput) -> AppResult<categories::Model> {
        input.validate()?;

        let now = Utc::now().into();
        let model = categories::ActiveModel {
            id: Set(Uuid::now_v7()),
            name: Set(input.name.trim().to_string()),
            description: Set(input.description),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = model.insert(&self.db).await.map_err(map_unique)?;
        tracing::info!(category_id = %created.id, name = %created.name, "Category created");
        Ok(created)
    }

    /// Renames, re-describes, or (de)activates a category. Categories are
    /// never deleted.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown category and a validation error for
    /// a blank or duplicate name.
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateCategoryInput,
    ) -> AppResult<Change<categories::Model>> {
        input.validate()?;
        let before = self.find(id).await?;

        let mut active: categories::ActiveModel = before.clone().into();
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now().into());

        let after = active.update(&self.db).await.map_err(map_unique)?;
        tracing::info!(category_id = %after.id, is_active = after.is_active, "Category updated");
        Ok(Change::updated(before, after))
    }
}
