//! Append-only audit log repository and the trail's persistent sink.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use deptledger_core::access::{Actor, Permission};
use deptledger_core::audit::{AuditAction, AuditEvent, AuditQuery, AuditSink};
use deptledger_shared::types::{DepartmentId, PageRequest, PageResponse};
use deptledger_shared::{AppError, AppResult};

use super::common::db_err;
use crate::entities::audit_logs;

/// Audit log repository. Rows are only ever inserted.
#[derive(Debug, Clone)]
pub struct AuditLogRepository {
    db: DatabaseConnection,
}

impl AuditLogRepository {
    /// Creates a new audit log repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Appends one event.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn append_event(&self, event: &AuditEvent) -> AppResult<audit_logs::Model> {
        let model = audit_logs::ActiveModel {
            id: Set(Uuid::now_v7()),
            department_id: Set(event.department_id.map(DepartmentId::into_inner)),
            actor_id: Set(event.actor_id.map(|id| id.into_inner())),
            action: Set(event.action.as_str().to_string()),
            entity_type: Set(event.entity_type.clone()),
            entity_id: Set(event.entity_id),
            old_values: Set(event.old_values.clone()),
            new_values: Set(event.new_values.clone()),
            ip_address: Set(event.client.ip_address.clone()),
            user_agent: Set(event.client.user_agent.clone()),
            created_at: Set(event.occurred_at.into()),
        };
        model.insert(&self.db).await.map_err(db_err)
    }

    /// Reads the actor's department trail, newest first. Actors who manage
    /// users also see rows with no department, such as anonymous
    /// authentication denials.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown action tag or an inverted
    /// time range.
    pub async fn query(
        &self,
        actor: &Actor,
        filter: AuditQuery,
        page: PageRequest,
    ) -> AppResult<PageResponse<audit_logs::Model>> {
        let department = audit_logs::Column::DepartmentId.eq(actor.department_id.into_inner());
        let mut condition = Condition::all().add(if actor.can(Permission::ManageUsers) {
            Condition::any()
                .add(department)
                .add(audit_logs::Column::DepartmentId.is_null())
        } else {
            Condition::all().add(department)
        });

        if let (Some(from), Some(to)) = (filter.from, filter.to)
            && from > to
        {
            return Err(AppError::Validation("from must not be after to".to_string()));
        }
        if let Some(action) = filter.action.as_deref() {
            let action = AuditAction::parse(action)
                .ok_or_else(|| AppError::Validation(format!("unknown audit action '{action}'")))?;
            condition = condition.add(audit_logs::Column::Action.eq(action.as_str()));
        }
        if let Some(actor_id) = filter.actor_id {
            condition = condition.add(audit_logs::Column::ActorId.eq(actor_id.into_inner()));
        }
        if let Some(entity_type) = filter.entity_type {
            condition = condition.add(audit_logs::Column::EntityType.eq(entity_type));
        }
        if let Some(entity_id) = filter.entity_id {
            condition = condition.add(audit_logs::Column::EntityId.eq(entity_id));
        }
        if let Some(from) = filter.from {
            condition = condition.add(audit_logs::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.to {
            condition = condition.add(audit_logs::Column::CreatedAt.lte(to));
        }

        let query = audit_logs::Entity::find().filter(condition);
        let total = query.clone().count(&self.db).await.map_err(db_err)?;
        let data = query
            .order_by_desc(audit_logs::Column::CreatedAt)
            .order_by_desc(audit_logs::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(PageResponse::new(data, page.page, page.per_page, total))
    }
}

#[async_trait]
impl AuditSink for AuditLogRepository {
    async fn append(&self, event: &AuditEvent) -> Result<(), AppError> {
        let row = self.append_event(event).await?;
        tracing::debug!(audit_id = %row.id, action = %row.action, "Audit event stored");
        Ok(())
    }
}
