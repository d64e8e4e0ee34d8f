//! Flexible budget instances and their breakdowns.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use uuid::Uuid;

use deptledger_core::access::{Actor, Permission};
use deptledger_core::budget::{
    BreakdownItem, BudgetError, BudgetInstanceSummary, BudgetRef, CreateFlexibleBudgetInput,
    UpdateFlexibleBudgetInput,
};
use deptledger_core::fiscal::{FiscalYear, fiscal_year_of};
use deptledger_shared::AppResult;
use deptledger_shared::types::DepartmentId;

use super::category::ensure_active;
use super::common::{Change, advisory_xact_lock, budget_lock_key, db_err};
use super::reconciliation::budget_spent;
use crate::entities::sea_orm_active_enums::ExpenseStatus;
use crate::entities::{budget_breakdowns, budget_expenses, budgets};

/// A budget instance with its breakdown and computed figures.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetWithSummary {
    /// The budget row.
    #[serde(flatten)]
    pub budget: budgets::Model,
    /// Breakdown items.
    pub breakdown: Vec<budget_breakdowns::Model>,
    /// Spend and allocation figures.
    pub summary: BudgetInstanceSummary,
}

impl BudgetWithSummary {
    fn assemble(
        budget: budgets::Model,
        breakdown: Vec<budget_breakdowns::Model>,
        spent: Decimal,
    ) -> Self {
        let allocated = breakdown.iter().map(|item| item.amount).sum();
        let summary = BudgetInstanceSummary::compute(budget.amount, spent, allocated);
        Self {
            budget,
            breakdown,
            summary,
        }
    }
}

#[derive(Debug, FromQueryResult)]
struct BudgetSpendRow {
    budget_id: Option<Uuid>,
    spent: Option<Decimal>,
}

/// Loads a budget visible to `department_id`.
pub(crate) async fn load_scoped<C: ConnectionTrait>(
    conn: &C,
    department_id: DepartmentId,
    id: Uuid,
) -> AppResult<budgets::Model> {
    budgets::Entity::find_by_id(id)
        .filter(budgets::Column::DepartmentId.eq(department_id.into_inner()))
        .one(conn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| BudgetError::BudgetNotFound(id).into())
}

/// The figures the flexible expense guard needs.
pub(crate) fn budget_ref(model: &budgets::Model) -> BudgetRef {
    BudgetRef {
        id: model.id,
        amount: model.amount,
    }
}

/// Takes the budget's advisory lock for the caller's transaction.
pub(crate) async fn lock_budget<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<(), DbErr> {
    advisory_xact_lock(conn, &budget_lock_key(id)).await
}

async fn breakdown_of<C: ConnectionTrait>(
    conn: &C,
    budget_id: Uuid,
) -> Result<Vec<budget_breakdowns::Model>, DbErr> {
    budget_breakdowns::Entity::find()
        .filter(budget_breakdowns::Column::BudgetId.eq(budget_id))
        .order_by_asc(budget_breakdowns::Column::CreatedAt)
        .all(conn)
        .await
}

async fn insert_breakdown<C: ConnectionTrait>(
    conn: &C,
    budget_id: Uuid,
    items: &[BreakdownItem],
) -> Result<Vec<budget_breakdowns::Model>, DbErr> {
    let mut inserted = Vec::with_capacity(items.len());
    for item in items {
        let model = budget_breakdowns::ActiveModel {
            id: Set(Uuid::now_v7()),
            budget_id: Set(budget_id),
            name: Set(item.name.trim().to_string()),
            amount: Set(item.amount),
            payment_method: Set(item.payment_method.clone()),
            created_at: Set(Utc::now().into()),
        };
        inserted.push(model.insert(conn).await?);
    }
    Ok(inserted)
}

/// Flexible budget repository.
#[derive(Debug, Clone)]
pub struct FlexibleBudgetRepository {
    db: DatabaseConnection,
}

impl FlexibleBudgetRepository {
    /// Creates a new flexible budget repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a budget instance and its breakdown.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `manage_budgets` and a validation error
    /// for a bad amount or a breakdown exceeding it.
    pub async fn create(
        &self,
        actor: &Actor,
        input: CreateFlexibleBudgetInput,
    ) -> AppResult<BudgetWithSummary> {
        actor.require(Permission::ManageBudgets)?;
        input.validate()?;

        let txn = self.db.begin().await.map_err(db_err)?;
        if let Some(category_id) = input.category_id {
            ensure_active(&txn, category_id).await?;
        }

        let now = Utc::now().into();
        let model = budgets::ActiveModel {
            id: Set(Uuid::now_v7()),
            department_id: Set(actor.department_id.into_inner()),
            category_id: Set(input.category_id.map(|c| c.into_inner())),
            name: Set(input.name.trim().to_string()),
            amount: Set(input.amount),
            source: Set(input.source.clone()),
            payment_method: Set(input.payment_method.clone()),
            budget_date: Set(input.budget_date),
            fiscal_year: Set(input.resolved_fiscal_year().to_string()),
            created_by: Set(actor.user_id.into_inner()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let budget = model.insert(&txn).await.map_err(db_err)?;
        let breakdown = insert_breakdown(&txn, budget.id, &input.breakdown)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;

        tracing::info!(
            budget_id = %budget.id,
            amount = %budget.amount,
            fiscal_year = %budget.fiscal_year,
            breakdown_items = breakdown.len(),
            "Flexible budget created"
        );

        Ok(BudgetWithSummary::assemble(budget, breakdown, Decimal::ZERO))
    }

    /// Gets a budget instance with its summary.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the budget is absent or in another department.
    pub async fn get(&self, department_id: DepartmentId, id: Uuid) -> AppResult<BudgetWithSummary> {
        let budget = load_scoped(&self.db, department_id, id).await?;
        let breakdown = breakdown_of(&self.db, id).await.map_err(db_err)?;
        let spent = budget_spent(&self.db, id).await.map_err(db_err)?;
        Ok(BudgetWithSummary::assemble(budget, breakdown, spent))
    }

    /// Lists a department's budget instances for a fiscal year.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(
        &self,
        department_id: DepartmentId,
        fiscal_year: FiscalYear,
    ) -> AppResult<Vec<BudgetWithSummary>> {
        let budgets = budgets::Entity::find()
            .filter(budgets::Column::DepartmentId.eq(department_id.into_inner()))
            .filter(budgets::Column::FiscalYear.eq(fiscal_year.to_string()))
            .order_by_asc(budgets::Column::BudgetDate)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        if budgets.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = budgets.iter().map(|b| b.id).collect();

        let mut breakdowns: HashMap<Uuid, Vec<budget_breakdowns::Model>> = HashMap::new();
        for item in budget_breakdowns::Entity::find()
            .filter(budget_breakdowns::Column::BudgetId.is_in(ids.clone()))
            .order_by_asc(budget_breakdowns::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?
        {
            breakdowns.entry(item.budget_id).or_default().push(item);
        }

        let spent: HashMap<Uuid, Decimal> = budget_expenses::Entity::find()
            .select_only()
            .column(budget_expenses::Column::BudgetId)
            .column_as(Expr::col(budget_expenses::Column::Amount).sum(), "spent")
            .filter(budget_expenses::Column::BudgetId.is_in(ids))
            .filter(budget_expenses::Column::Status.eq(ExpenseStatus::Approved))
            .group_by(budget_expenses::Column::BudgetId)
            .into_model::<BudgetSpendRow>()
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .filter_map(|row| Some((row.budget_id?, row.spent.unwrap_or(Decimal::ZERO))))
            .collect();

        Ok(budgets
            .into_iter()
            .map(|budget| {
                let breakdown = breakdowns.remove(&budget.id).unwrap_or_default();
                let spent = spent.get(&budget.id).copied().unwrap_or(Decimal::ZERO);
                BudgetWithSummary::assemble(budget, breakdown, spent)
            })
            .collect())
    }

    /// Updates a budget instance. A provided breakdown replaces the old one.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `manage_budgets`, `NotFound` for an
    /// unknown budget, and a validation error when the breakdown would
    /// exceed the amount.
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        input: UpdateFlexibleBudgetInput,
    ) -> AppResult<Change<BudgetWithSummary>> {
        actor.require(Permission::ManageBudgets)?;

        let txn = self.db.begin().await.map_err(db_err)?;
        lock_budget(&txn, id).await.map_err(db_err)?;
        let budget = load_scoped(&txn, actor.department_id, id).await?;
        input.validate(budget.amount)?;

        let old_breakdown = breakdown_of(&txn, id).await.map_err(db_err)?;
        let spent = budget_spent(&txn, id).await.map_err(db_err)?;
        let before = BudgetWithSummary::assemble(budget.clone(), old_breakdown.clone(), spent);

        let amount = input.amount.unwrap_or(budget.amount);
        if input.breakdown.is_none() {
            let allocated: Decimal = old_breakdown.iter().map(|item| item.amount).sum();
            if allocated > amount {
                return Err(BudgetError::BreakdownExceedsAmount { allocated, amount }.into());
            }
        }

        let mut active: budgets::ActiveModel = budget.into();
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(new_amount) = input.amount {
            active.amount = Set(new_amount);
        }
        if let Some(source) = input.source {
            active.source = Set(Some(source));
        }
        if let Some(payment_method) = input.payment_method {
            active.payment_method = Set(Some(payment_method));
        }
        if let Some(budget_date) = input.budget_date {
            active.budget_date = Set(budget_date);
            active.fiscal_year = Set(fiscal_year_of(budget_date).to_string());
        }
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(&txn).await.map_err(db_err)?;

        let breakdown = match &input.breakdown {
            Some(items) => {
                budget_breakdowns::Entity::delete_many()
                    .filter(budget_breakdowns::Column::BudgetId.eq(id))
                    .exec(&txn)
                    .await
                    .map_err(db_err)?;
                insert_breakdown(&txn, id, items).await.map_err(db_err)?
            }
            None => old_breakdown,
        };
        txn.commit().await.map_err(db_err)?;

        tracing::info!(
            budget_id = %id,
            amount = %updated.amount,
            breakdown_replaced = input.breakdown.is_some(),
            "Flexible budget updated"
        );

        let after = BudgetWithSummary::assemble(updated, breakdown, spent);
        Ok(Change::updated(before, after))
    }

    /// Deletes a budget instance that has no expenses recorded against it.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without the delete capability and `InvalidState`
    /// while expenses still reference the budget.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> AppResult<budgets::Model> {
        actor.require(Permission::Delete)?;

        let txn = self.db.begin().await.map_err(db_err)?;
        lock_budget(&txn, id).await.map_err(db_err)?;
        let budget = load_scoped(&txn, actor.department_id, id).await?;

        let linked = budget_expenses::Entity::find()
            .filter(budget_expenses::Column::BudgetId.eq(id))
            .count(&txn)
            .await
            .map_err(db_err)?;
        if linked > 0 {
            return Err(BudgetError::BudgetInUse(id).into());
        }

        budget_breakdowns::Entity::delete_many()
            .filter(budget_breakdowns::Column::BudgetId.eq(id))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        budgets::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;

        tracing::info!(budget_id = %id, "Flexible budget deleted");
        Ok(budget)
    }
}
