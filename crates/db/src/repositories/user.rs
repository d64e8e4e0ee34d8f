//! User repository.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    SqlErr,
};
use uuid::Uuid;

use deptledger_core::access::{Actor, Role};
use deptledger_shared::types::{DepartmentId, UserId};
use deptledger_shared::{AppError, AppResult};

use super::common::db_err;
use crate::entities::users;

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct CreateUser {
    /// Department the user belongs to.
    pub department_id: DepartmentId,
    /// Display name.
    pub full_name: String,
    /// Unique email.
    pub email: String,
    /// Role.
    pub role: Role,
}

/// User repository.
#[derive(Debug, Clone)]
pub struct UserRepository {
    db: DatabaseConnection,
}

impl UserRepository {
    /// Creates a new user repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates an active user.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank or duplicate email.
    pub async fn create(&self, input: CreateUser) -> AppResult<users::Model> {
        let email = input.email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::Validation("a valid email is required".to_string()));
        }

        let now = Utc::now().into();
        let model = users::ActiveModel {
            id: Set(Uuid::now_v7()),
            department_id: Set(input.department_id.into_inner()),
            full_name: Set(input.full_name.trim().to_string()),
            email: Set(email),
            role: Set(input.role.into()),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = model.insert(&self.db).await.map_err(|e| {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                AppError::Validation("Email already registered".to_string())
            } else {
                db_err(e)
            }
        })?;
        tracing::info!(user_id = %created.id, role = ?created.role, "User created");
        Ok(created)
    }

    /// Gets a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the user does not exist.
    pub async fn find(&self, id: UserId) -> AppResult<users::Model> {
        users::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))
    }

    /// Gets a user by email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email.trim().to_lowercase()))
            .one(&self.db)
            .await
            .map_err(db_err)
    }
}

/// The actor a stored user acts as.
#[must_use]
pub fn actor_of(user: &users::Model) -> Actor {
    Actor::new(
        UserId::from_uuid(user.id),
        DepartmentId::from_uuid(user.department_id),
        user.role.into(),
    )
}
