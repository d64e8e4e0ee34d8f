//! Budget plan and allotment repository.
//!
//! Both tables are keyed on (department, category, fiscal year) and written
//! with `INSERT ... ON CONFLICT DO UPDATE`, so repeating an upsert leaves a
//! single row carrying the latest values.

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use deptledger_core::access::{Actor, Permission};
use deptledger_core::budget::{UpsertAllotmentInput, UpsertBudgetPlanInput};
use deptledger_core::fiscal::FiscalYear;
use deptledger_shared::AppResult;
use deptledger_shared::types::DepartmentId;

use super::category::ensure_active;
use super::common::{Change, db_err};
use crate::entities::{budget_allotments, budget_plans};

/// Budget plan and allotment repository.
#[derive(Debug, Clone)]
pub struct BudgetRepository {
    db: DatabaseConnection,
}

impl BudgetRepository {
    /// Creates a new budget repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts or replaces the plan for the input's key.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `manage_budgets`, a validation error for a
    /// negative amount, and `NotFound` for an unknown category.
    pub async fn upsert_plan(
        &self,
        actor: &Actor,
        input: UpsertBudgetPlanInput,
    ) -> AppResult<Change<budget_plans::Model>> {
        actor.require(Permission::ManageBudgets)?;
        input.validate()?;

        let txn = self.db.begin().await.map_err(db_err)?;
        ensure_active(&txn, input.category_id).await?;

        let label = input.fiscal_year.to_string();
        let before = budget_plans::Entity::find()
            .filter(budget_plans::Column::DepartmentId.eq(actor.department_id.into_inner()))
            .filter(budget_plans::Column::CategoryId.eq(input.category_id.into_inner()))
            .filter(budget_plans::Column::FiscalYear.eq(label.clone()))
            .one(&txn)
            .await
            .map_err(db_err)?;

        let now = Utc::now().into();
        let model = budget_plans::ActiveModel {
            id: Set(Uuid::now_v7()),
            department_id: Set(actor.department_id.into_inner()),
            category_id: Set(input.category_id.into_inner()),
            fiscal_year: Set(label),
            proposed_amount: Set(input.proposed_amount),
            justification: Set(input.justification),
            status: Set(input.status.into()),
            created_by: Set(actor.user_id.into_inner()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let after = budget_plans::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    budget_plans::Column::DepartmentId,
                    budget_plans::Column::CategoryId,
                    budget_plans::Column::FiscalYear,
                ])
                .update_columns([
                    budget_plans::Column::ProposedAmount,
                    budget_plans::Column::Justification,
                    budget_plans::Column::Status,
                    budget_plans::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_with_returning(&txn)
            .await
            .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;

        tracing::info!(
            plan_id = %after.id,
            category_id = %after.category_id,
            fiscal_year = %after.fiscal_year,
            proposed_amount = %after.proposed_amount,
            "Budget plan upserted"
        );

        Ok(Change { before, after })
    }

    /// Inserts or replaces the allotment for the input's key, recording the
    /// actor as approver.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `manage_budgets`, a validation error for a
    /// negative amount, and `NotFound` for an unknown category.
    pub async fn upsert_allotment(
        &self,
        actor: &Actor,
        input: UpsertAllotmentInput,
    ) -> AppResult<Change<budget_allotments::Model>> {
        actor.require(Permission::ManageBudgets)?;
        input.validate()?;

        let txn = self.db.begin().await.map_err(db_err)?;
        ensure_active(&txn, input.category_id).await?;

        let label = input.fiscal_year.to_string();
        let before = budget_allotments::Entity::find()
            .filter(budget_allotments::Column::DepartmentId.eq(actor.department_id.into_inner()))
            .filter(budget_allotments::Column::CategoryId.eq(input.category_id.into_inner()))
            .filter(budget_allotments::Column::FiscalYear.eq(label.clone()))
            .one(&txn)
            .await
            .map_err(db_err)?;

        let now = Utc::now().into();
        let model = budget_allotments::ActiveModel {
            id: Set(Uuid::now_v7()),
            department_id: Set(actor.department_id.into_inner()),
            category_id: Set(input.category_id.into_inner()),
            fiscal_year: Set(label),
            allotted_amount: Set(input.allotted_amount),
            notes: Set(input.notes),
            approved_by: Set(actor.user_id.into_inner()),
            approved_at: Set(now),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let after = budget_allotments::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    budget_allotments::Column::DepartmentId,
                    budget_allotments::Column::CategoryId,
                    budget_allotments::Column::FiscalYear,
                ])
                .update_columns([
                    budget_allotments::Column::AllottedAmount,
                    budget_allotments::Column::Notes,
                    budget_allotments::Column::ApprovedBy,
                    budget_allotments::Column::ApprovedAt,
                    budget_allotments::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_with_returning(&txn)
            .await
            .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;

        tracing::info!(
            allotment_id = %after.id,
            category_id = %after.category_id,
            fiscal_year = %after.fiscal_year,
            allotted_amount = %after.allotted_amount,
            "Budget allotment upserted"
        );

        Ok(Change { before, after })
    }

    /// Lists a department's plans for a fiscal year.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_plans(
        &self,
        department_id: DepartmentId,
        fiscal_year: FiscalYear,
    ) -> AppResult<Vec<budget_plans::Model>> {
        budget_plans::Entity::find()
            .filter(budget_plans::Column::DepartmentId.eq(department_id.into_inner()))
            .filter(budget_plans::Column::FiscalYear.eq(fiscal_year.to_string()))
            .order_by_asc(budget_plans::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)
    }

    /// Lists a department's allotments for a fiscal year.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_allotments(
        &self,
        department_id: DepartmentId,
        fiscal_year: FiscalYear,
    ) -> AppResult<Vec<budget_allotments::Model>> {
        budget_allotments::Entity::find()
            .filter(budget_allotments::Column::DepartmentId.eq(department_id.into_inner()))
            .filter(budget_allotments::Column::FiscalYear.eq(fiscal_year.to_string()))
            .order_by_asc(budget_allotments::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)
    }
}
