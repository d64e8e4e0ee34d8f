//! Department repository.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use deptledger_shared::types::DepartmentId;
use deptledger_shared::{AppError, AppResult};

use super::common::db_err;
use crate::entities::departments;

/// Department repository.
#[derive(Debug, Clone)]
pub struct DepartmentRepository {
    db: DatabaseConnection,
}

impl DepartmentRepository {
    /// Creates a new department repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a department.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank name.
    pub async fn create(&self, name: &str) -> AppResult<departments::Model> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("department name is required".to_string()));
        }

        let model = departments::ActiveModel {
            id: Set(Uuid::now_v7()),
            name: Set(name.to_string()),
            created_at: Set(Utc::now().into()),
        };
        let created = model.insert(&self.db).await.map_err(db_err)?;
        tracing::info!(department_id = %created.id, name = %created.name, "Department created");
        Ok(created)
    }

    /// Gets a department by ID.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the department does not exist.
    pub async fn find(&self, id: DepartmentId) -> AppResult<departments::Model> {
        departments::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or_else(|| AppError::NotFound(format!("Department {id} not found")))
    }

    /// Gets a department by its unique name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_name(&self, name: &str) -> AppResult<Option<departments::Model>> {
        departments::Entity::find()
            .filter(departments::Column::Name.eq(name.trim()))
            .one(&self.db)
            .await
            .map_err(db_err)
    }
}
