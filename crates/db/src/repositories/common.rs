//! Helpers shared by the repositories.

use sea_orm::{ConnectionTrait, DbBackend, DbErr, Statement};
use serde::Serialize;
use uuid::Uuid;

use deptledger_core::fiscal::FiscalYear;
use deptledger_shared::AppError;
use deptledger_shared::types::{CategoryId, DepartmentId};

/// Converts a store failure, logging the detail that the client never sees.
pub(crate) fn db_err(err: DbErr) -> AppError {
    tracing::error!(error = %err, "Database operation failed");
    AppError::Database(err.to_string())
}

/// Before/after pair returned by mutations so callers can audit them.
#[derive(Debug, Clone, Serialize)]
pub struct Change<M> {
    /// State before the mutation; `None` for inserts.
    pub before: Option<M>,
    /// State after the mutation.
    pub after: M,
}

impl<M> Change<M> {
    /// A freshly inserted row.
    pub const fn created(after: M) -> Self {
        Self {
            before: None,
            after,
        }
    }

    /// An updated row.
    pub const fn updated(before: M, after: M) -> Self {
        Self {
            before: Some(before),
            after,
        }
    }
}

/// Serializes spends against one budget key until the transaction ends.
pub(crate) async fn advisory_xact_lock<C: ConnectionTrait>(conn: &C, key: &str) -> Result<(), DbErr> {
    conn.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        "SELECT pg_advisory_xact_lock(hashtext($1))",
        [key.into()],
    ))
    .await?;
    Ok(())
}

/// Lock key for a category allotment.
pub(crate) fn category_lock_key(
    department_id: DepartmentId,
    category_id: CategoryId,
    fiscal_year: FiscalYear,
) -> String {
    format!("allotment:{department_id}:{category_id}:{fiscal_year}")
}

/// Lock key for a flexible budget instance.
pub(crate) fn budget_lock_key(budget_id: Uuid) -> String {
    format!("budget:{budget_id}")
}

/// Escapes `LIKE` wildcards in user input.
pub(crate) fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
