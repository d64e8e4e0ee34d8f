//! Per-department active fiscal year.

use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, QueryFilter,
    Statement, TransactionTrait,
};

use deptledger_core::access::{Actor, Permission};
use deptledger_core::fiscal::FiscalYear;
use deptledger_shared::{AppError, AppResult};
use deptledger_shared::types::DepartmentId;

use super::common::{Change, advisory_xact_lock, db_err};
use crate::entities::department_fiscal_years;

const REGISTER_FISCAL_YEAR: &str = r"
INSERT INTO department_fiscal_years (department_id, fiscal_year, is_active, updated_at)
VALUES ($1, $2, FALSE, NOW())
ON CONFLICT (department_id, fiscal_year) DO NOTHING
";

const ACTIVATE_FISCAL_YEAR: &str = r"
UPDATE department_fiscal_years
SET is_active = (fiscal_year = $2), updated_at = NOW()
WHERE department_id = $1
";

/// Active fiscal year repository.
#[derive(Debug, Clone)]
pub struct FiscalYearRepository {
    db: DatabaseConnection,
}

impl FiscalYearRepository {
    /// Creates a new fiscal year repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Makes `fiscal_year` the department's only active fiscal year and
    /// returns the previous and new active years.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `manage_budgets`.
    pub async fn activate(
        &self,
        actor: &Actor,
        fiscal_year: FiscalYear,
    ) -> AppResult<Change<FiscalYear>> {
        actor.require(Permission::ManageBudgets)?;
        let department_id = actor.department_id.into_inner();
        let label = fiscal_year.to_string();

        let txn = self.db.begin().await.map_err(db_err)?;
        advisory_xact_lock(&txn, &format!("fiscal_year:{}", actor.department_id))
            .await
            .map_err(db_err)?;
        let previous = active_in(&txn, actor.department_id).await?;

        txn.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            REGISTER_FISCAL_YEAR,
            [department_id.into(), label.clone().into()],
        ))
        .await
        .map_err(db_err)?;
        txn.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            ACTIVATE_FISCAL_YEAR,
            [department_id.into(), label.into()],
        ))
        .await
        .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;

        tracing::info!(
            department_id = %actor.department_id,
            %fiscal_year,
            previous = ?previous.map(|fy| fy.to_string()),
            "Fiscal year activated"
        );

        Ok(Change {
            before: previous,
            after: fiscal_year,
        })
    }

    /// The department's active fiscal year, if one was activated.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn active(&self, department_id: DepartmentId) -> AppResult<Option<FiscalYear>> {
        active_in(&self.db, department_id).await
    }

    /// Resolves an optional fiscal year: the requested one, else the
    /// department's active one, else the current one.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn resolve(
        &self,
        department_id: DepartmentId,
        requested: Option<FiscalYear>,
    ) -> AppResult<FiscalYear> {
        if let Some(fiscal_year) = requested {
            return Ok(fiscal_year);
        }
        Ok(self
            .active(department_id)
            .await?
            .unwrap_or_else(FiscalYear::current))
    }
}

async fn active_in<C: ConnectionTrait>(
    conn: &C,
    department_id: DepartmentId,
) -> AppResult<Option<FiscalYear>> {
    let row = department_fiscal_years::Entity::find()
        .filter(department_fiscal_years::Column::DepartmentId.eq(department_id.into_inner()))
        .filter(department_fiscal_years::Column::IsActive.eq(true))
        .one(conn)
        .await
        .map_err(db_err)?;

    row.map(|r| {
        FiscalYear::parse(&r.fiscal_year).map_err(|e| {
            AppError::Internal(format!("stored fiscal year '{}' is invalid: {e}", r.fiscal_year))
        })
    })
    .transpose()
}
