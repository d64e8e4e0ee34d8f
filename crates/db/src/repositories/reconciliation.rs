//! Loads plan, allotment and approved spend figures for reconciliation.
//!
//! Spend is attributed to a fiscal year by `expense_date` falling inside
//! `FiscalYear::start_date()..=end_date()`. A category's spend covers
//! category-bound expenses plus flexible expenses charged to the category
//! without a budget instance.

use std::collections::HashMap;

use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult,
    QueryFilter, QueryOrder, QuerySelect,
};
use uuid::Uuid;

use deptledger_core::budget::{
    BudgetFigures, CategoryRef, ReconciliationEngine, ReconciliationInput, ReconciliationReport,
};
use deptledger_core::fiscal::FiscalYear;
use deptledger_shared::AppResult;
use deptledger_shared::types::{CategoryId, DepartmentId};

use super::common::db_err;
use crate::entities::{
    budget_allotments, budget_expenses, budget_plans, categories, expenses,
    sea_orm_active_enums::ExpenseStatus,
};

#[derive(Debug, FromQueryResult)]
struct SpendRow {
    category_id: Option<Uuid>,
    spent: Option<Decimal>,
}

#[derive(Debug, FromQueryResult)]
struct SumRow {
    spent: Option<Decimal>,
}

async fn spent_by_category<C: ConnectionTrait>(
    conn: &C,
    department_id: DepartmentId,
    fiscal_year: FiscalYear,
    only: Option<CategoryId>,
) -> Result<HashMap<CategoryId, Decimal>, DbErr> {
    let mut bound = expenses::Entity::find()
        .select_only()
        .column(expenses::Column::CategoryId)
        .column_as(Expr::col(expenses::Column::Amount).sum(), "spent")
        .filter(expenses::Column::DepartmentId.eq(department_id.into_inner()))
        .filter(expenses::Column::Status.eq(ExpenseStatus::Approved))
        .filter(
            expenses::Column::ExpenseDate.between(fiscal_year.start_date(), fiscal_year.end_date()),
        )
        .group_by(expenses::Column::CategoryId);

    let mut flexible = budget_expenses::Entity::find()
        .select_only()
        .column(budget_expenses::Column::CategoryId)
        .column_as(Expr::col(budget_expenses::Column::Amount).sum(), "spent")
        .filter(budget_expenses::Column::DepartmentId.eq(department_id.into_inner()))
        .filter(budget_expenses::Column::Status.eq(ExpenseStatus::Approved))
        .filter(budget_expenses::Column::BudgetId.is_null())
        .filter(budget_expenses::Column::CategoryId.is_not_null())
        .filter(
            budget_expenses::Column::ExpenseDate
                .between(fiscal_year.start_date(), fiscal_year.end_date()),
        )
        .group_by(budget_expenses::Column::CategoryId);

    if let Some(category_id) = only {
        bound = bound.filter(expenses::Column::CategoryId.eq(category_id.into_inner()));
        flexible =
            flexible.filter(budget_expenses::Column::CategoryId.eq(category_id.into_inner()));
    }

    let mut spent: HashMap<CategoryId, Decimal> = HashMap::new();
    let rows = bound
        .into_model::<SpendRow>()
        .all(conn)
        .await?
        .into_iter()
        .chain(flexible.into_model::<SpendRow>().all(conn).await?);

    for row in rows {
        if let Some(id) = row.category_id {
            *spent.entry(CategoryId::from_uuid(id)).or_default() +=
                row.spent.unwrap_or(Decimal::ZERO);
        }
    }
    Ok(spent)
}

async fn planned_and_allotted<C: ConnectionTrait>(
    conn: &C,
    department_id: DepartmentId,
    fiscal_year: FiscalYear,
    only: Option<CategoryId>,
) -> Result<(HashMap<CategoryId, Decimal>, HashMap<CategoryId, Decimal>), DbErr> {
    let label = fiscal_year.to_string();

    let mut plans = budget_plans::Entity::find()
        .filter(budget_plans::Column::DepartmentId.eq(department_id.into_inner()))
        .filter(budget_plans::Column::FiscalYear.eq(label.clone()));
    let mut allotments = budget_allotments::Entity::find()
        .filter(budget_allotments::Column::DepartmentId.eq(department_id.into_inner()))
        .filter(budget_allotments::Column::FiscalYear.eq(label));

    if let Some(category_id) = only {
        plans = plans.filter(budget_plans::Column::CategoryId.eq(category_id.into_inner()));
        allotments =
            allotments.filter(budget_allotments::Column::CategoryId.eq(category_id.into_inner()));
    }

    let proposed = plans
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (CategoryId::from_uuid(p.category_id), p.proposed_amount))
        .collect();
    let allotted = allotments
        .all(conn)
        .await?
        .into_iter()
        .map(|a| (CategoryId::from_uuid(a.category_id), a.allotted_amount))
        .collect();

    Ok((proposed, allotted))
}

/// Loads the raw amounts for every active category.
pub(crate) async fn load_input<C: ConnectionTrait>(
    conn: &C,
    department_id: DepartmentId,
    fiscal_year: FiscalYear,
) -> Result<ReconciliationInput, DbErr> {
    let categories = categories::Entity::find()
        .filter(categories::Column::IsActive.eq(true))
        .order_by_asc(categories::Column::Name)
        .all(conn)
        .await?
        .into_iter()
        .map(|c| CategoryRef {
            id: CategoryId::from_uuid(c.id),
            name: c.name,
        })
        .collect();

    let (proposed, allotted) = planned_and_allotted(conn, department_id, fiscal_year, None).await?;
    let spent = spent_by_category(conn, department_id, fiscal_year, None).await?;

    Ok(ReconciliationInput {
        categories,
        proposed,
        allotted,
        spent,
    })
}

/// Figures for one category, read on `conn` so a guarded insert can run in
/// the same transaction.
pub(crate) async fn category_figures<C: ConnectionTrait>(
    conn: &C,
    department_id: DepartmentId,
    category_id: CategoryId,
    fiscal_year: FiscalYear,
) -> Result<BudgetFigures, DbErr> {
    let (proposed, allotted) =
        planned_and_allotted(conn, department_id, fiscal_year, Some(category_id)).await?;
    let spent = spent_by_category(conn, department_id, fiscal_year, Some(category_id)).await?;

    let input = ReconciliationInput {
        categories: Vec::new(),
        proposed,
        allotted,
        spent,
    };
    Ok(ReconciliationEngine::figures_for(category_id, &input))
}

/// Approved spend recorded against one budget instance.
pub(crate) async fn budget_spent<C: ConnectionTrait>(
    conn: &C,
    budget_id: Uuid,
) -> Result<Decimal, DbErr> {
    let row = budget_expenses::Entity::find()
        .select_only()
        .column_as(Expr::col(budget_expenses::Column::Amount).sum(), "spent")
        .filter(budget_expenses::Column::BudgetId.eq(budget_id))
        .filter(budget_expenses::Column::Status.eq(ExpenseStatus::Approved))
        .into_model::<SumRow>()
        .one(conn)
        .await?;

    Ok(row.and_then(|r| r.spent).unwrap_or(Decimal::ZERO))
}

/// Read-only reconciliation queries.
#[derive(Debug, Clone)]
pub struct ReconciliationRepository {
    db: DatabaseConnection,
}

impl ReconciliationRepository {
    /// Creates a new reconciliation repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Reconciles a department's fiscal year. Never fails for missing data.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn report(
        &self,
        department_id: DepartmentId,
        fiscal_year: FiscalYear,
    ) -> AppResult<ReconciliationReport> {
        let input = load_input(&self.db, department_id, fiscal_year)
            .await
            .map_err(db_err)?;
        Ok(ReconciliationEngine::reconcile(fiscal_year, &input))
    }

    /// Figures for one category.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn figures_for(
        &self,
        department_id: DepartmentId,
        category_id: CategoryId,
        fiscal_year: FiscalYear,
    ) -> AppResult<BudgetFigures> {
        category_figures(&self.db, department_id, category_id, fiscal_year)
            .await
            .map_err(db_err)
    }
}
