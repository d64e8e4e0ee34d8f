//! Flexible budget expense repository.
//!
//! An expense with a `budget_id` draws on that budget instance and is
//! serialized on the budget's advisory lock. One without draws on its
//! category's allotment exactly like a category-bound expense.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use uuid::Uuid;

use deptledger_core::access::{Actor, Permission};
use deptledger_core::budget::{Admission, AvailabilityGuard, BreakdownItem, BudgetError, BudgetRef};
use deptledger_core::expense::{
    ApprovalStateMachine, CreateBudgetExpenseInput, ExpenseAction, ExpenseChanges, ExpenseError,
    ExpenseKind, ExpensePredicate, ExpenseSnapshot, StatusDecision,
};
use deptledger_core::fiscal::fiscal_year_of;
use deptledger_shared::types::{CategoryId, DepartmentId, PageRequest, PageResponse, UserId};
use deptledger_shared::{AppError, AppResult};

use super::category::ensure_active;
use super::common::{Change, db_err};
use super::expense::admit_to_category;
use super::filter::budget_expense_condition;
use super::flexible::{self, budget_ref, lock_budget};
use super::receipt::{ReceiptParent, delete_receipts, insert_receipts, receipts_of};
use super::reconciliation::budget_spent;
use crate::entities::sea_orm_active_enums::ExpenseStatus;
use crate::entities::{budget_expense_breakdowns, budget_expenses, receipts};

/// A flexible expense with its breakdown and receipts.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetExpenseDetail {
    /// The expense row.
    #[serde(flatten)]
    pub expense: budget_expenses::Model,
    /// Breakdown items.
    pub breakdown: Vec<budget_expense_breakdowns::Model>,
    /// Attached receipt metadata.
    pub receipts: Vec<receipts::Model>,
}

/// Loads a flexible expense visible to `department_id`, optionally `FOR UPDATE`.
pub(crate) async fn load_scoped<C: ConnectionTrait>(
    conn: &C,
    department_id: DepartmentId,
    id: Uuid,
    for_update: bool,
) -> AppResult<budget_expenses::Model> {
    let mut query = budget_expenses::Entity::find_by_id(id)
        .filter(budget_expenses::Column::DepartmentId.eq(department_id.into_inner()));
    if for_update {
        query = query.lock_exclusive();
    }
    query
        .one(conn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| ExpenseError::NotFound(id).into())
}

/// The fields the state machine decides on.
pub(crate) fn snapshot(model: &budget_expenses::Model) -> ExpenseSnapshot {
    ExpenseSnapshot {
        id: model.id,
        kind: ExpenseKind::BudgetExpense,
        department_id: DepartmentId::from_uuid(model.department_id),
        created_by: UserId::from_uuid(model.created_by),
        status: model.status.into(),
        amount: model.amount,
    }
}

/// Runs the guard against a budget instance. The caller must hold the
/// budget's advisory lock.
async fn admit_to_budget<C: ConnectionTrait>(
    conn: &C,
    budget: BudgetRef,
    amount: Decimal,
    credit: Decimal,
) -> AppResult<Admission> {
    let spent = budget_spent(conn, budget.id).await.map_err(db_err)?;
    let remaining = budget.amount - spent + credit;

    AvailabilityGuard::check_remaining(remaining, amount).map_err(|err| {
        tracing::warn!(
            budget_id = %budget.id,
            %remaining,
            requested = %amount,
            "Budget expense rejected by availability check"
        );
        err.into()
    })
}

async fn breakdown_of<C: ConnectionTrait>(
    conn: &C,
    budget_expense_id: Uuid,
) -> Result<Vec<budget_expense_breakdowns::Model>, DbErr> {
    budget_expense_breakdowns::Entity::find()
        .filter(budget_expense_breakdowns::Column::BudgetExpenseId.eq(budget_expense_id))
        .order_by_asc(budget_expense_breakdowns::Column::CreatedAt)
        .all(conn)
        .await
}

async fn delete_breakdown<C: ConnectionTrait>(
    conn: &C,
    budget_expense_id: Uuid,
) -> Result<(), DbErr> {
    budget_expense_breakdowns::Entity::delete_many()
        .filter(budget_expense_breakdowns::Column::BudgetExpenseId.eq(budget_expense_id))
        .exec(conn)
        .await?;
    Ok(())
}

async fn insert_breakdown<C: ConnectionTrait>(
    conn: &C,
    budget_expense_id: Uuid,
    items: &[BreakdownItem],
) -> Result<Vec<budget_expense_breakdowns::Model>, DbErr> {
    let mut inserted = Vec::with_capacity(items.len());
    for item in items {
        let model = budget_expense_breakdowns::ActiveModel {
            id: Set(Uuid::now_v7()),
            budget_expense_id: Set(budget_expense_id),
            name: Set(item.name.trim().to_string()),
            amount: Set(item.amount),
            payment_method: Set(item.payment_method.clone()),
            created_at: Set(Utc::now().into()),
        };
        inserted.push(model.insert(conn).await?);
    }
    Ok(inserted)
}

/// Flexible budget expense repository.
#[derive(Debug, Clone)]
pub struct BudgetExpenseRepository {
    db: DatabaseConnection,
}

impl BudgetExpenseRepository {
    /// Creates a new budget expense repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Records a pending flexible expense if its budget instance (or its
    /// category, without one) covers the amount.
    ///
    /// # Errors
    ///
    /// * `Forbidden` without the create capability
    /// * `InsufficientBudget` when the amount exceeds the remaining balance
    /// * `NotFound` / validation errors for a bad target or input
    pub async fn create(
        &self,
        actor: &Actor,
        input: CreateBudgetExpenseInput,
    ) -> AppResult<BudgetExpenseDetail> {
        actor.require(Permission::Create)?;
        input.validate()?;

        let txn = self.db.begin().await.map_err(db_err)?;

        let (admission, category_id) = match (input.budget_id, input.category_id) {
            (Some(budget_id), category_id) => {
                lock_budget(&txn, budget_id).await.map_err(db_err)?;
                let budget = flexible::load_scoped(&txn, actor.department_id, budget_id).await?;
                if let Some(category_id) = category_id {
                    ensure_active(&txn, category_id).await?;
                }
                let admission =
                    admit_to_budget(&txn, budget_ref(&budget), input.amount, Decimal::ZERO)
                        .await?;
                (
                    admission,
                    category_id
                        .map(CategoryId::into_inner)
                        .or(budget.category_id),
                )
            }
            (None, Some(category_id)) => {
                ensure_active(&txn, category_id).await?;
                let admission = admit_to_category(
                    &txn,
                    actor.department_id,
                    category_id,
                    input.expense_date,
                    input.amount,
                    Decimal::ZERO,
                )
                .await?;
                (admission, Some(category_id.into_inner()))
            }
            (None, None) => {
                return Err(AppError::Validation(
                    "either budget_id or category_id is required".to_string(),
                ));
            }
        };

        let now = Utc::now().into();
        let model = budget_expenses::ActiveModel {
            id: Set(Uuid::now_v7()),
            department_id: Set(actor.department_id.into_inner()),
            budget_id: Set(input.budget_id),
            category_id: Set(category_id),
            vendor: Set(input.vendor.trim().to_string()),
            amount: Set(input.amount),
            expense_date: Set(input.expense_date),
            description: Set(input.description.clone()),
            status: Set(ExpenseStatus::Pending),
            created_by: Set(actor.user_id.into_inner()),
            approved_by: Set(None),
            approved_at: Set(None),
            approval_notes: Set(None),
            rejection_reason: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let expense = model.insert(&txn).await.map_err(db_err)?;

        let breakdown = insert_breakdown(&txn, expense.id, &input.breakdown)
            .await
            .map_err(db_err)?;
        let receipts = insert_receipts(
            &txn,
            actor.department_id,
            ReceiptParent::BudgetExpense(expense.id),
            actor.user_id,
            &input.receipts,
        )
        .await
        .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;

        tracing::info!(
            budget_expense_id = %expense.id,
            budget_id = ?expense.budget_id,
            amount = %expense.amount,
            remaining_after = %admission.remaining_after(),
            "Budget expense created"
        );

        Ok(BudgetExpenseDetail {
            expense,
            breakdown,
            receipts,
        })
    }

    /// Gets a flexible expense with its breakdown and receipts.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the expense is absent or in another department.
    pub async fn find(
        &self,
        department_id: DepartmentId,
        id: Uuid,
    ) -> AppResult<BudgetExpenseDetail> {
        let expense = load_scoped(&self.db, department_id, id, false).await?;
        let breakdown = breakdown_of(&self.db, id).await.map_err(db_err)?;
        let receipts = receipts_of(&self.db, ReceiptParent::BudgetExpense(id))
            .await
            .map_err(db_err)?;
        Ok(BudgetExpenseDetail {
            expense,
            breakdown,
            receipts,
        })
    }

    /// Lists flexible expenses matching every predicate, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(
        &self,
        department_id: DepartmentId,
        predicates: &[ExpensePredicate],
        page: PageRequest,
    ) -> AppResult<PageResponse<budget_expenses::Model>> {
        let query = budget_expenses::Entity::find()
            .filter(budget_expense_condition(department_id, predicates)?);

        let total = query.clone().count(&self.db).await.map_err(db_err)?;
        let data = query
            .order_by_desc(budget_expenses::Column::CreatedAt)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(PageResponse::new(data, page.page, page.per_page, total))
    }

    /// Approves or rejects a pending flexible expense.
    ///
    /// # Errors
    ///
    /// Same as [`super::ExpenseRepository::decide`].
    pub async fn decide(
        &self,
        actor: &Actor,
        id: Uuid,
        decision: StatusDecision,
    ) -> AppResult<Change<budget_expenses::Model>> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let before = load_scoped(&txn, actor.department_id, id, true).await?;
        let snapshot = snapshot(&before);

        let action = match decision {
            StatusDecision::Approve { notes } => {
                ApprovalStateMachine::approve(&snapshot, actor, notes)
            }
            StatusDecision::Reject { reason } => {
                ApprovalStateMachine::reject(&snapshot, actor, reason)
            }
        }
        .inspect_err(|err| {
            tracing::warn!(
                budget_expense_id = %id,
                actor = %actor.user_id,
                error = %err,
                "Budget expense decision refused"
            );
        })?;

        let mut active: budget_expenses::ActiveModel = before.clone().into();
        active.status = Set(action.new_status().into());
        active.approved_by = Set(Some(action.approved_by().into_inner()));
        active.approved_at = Set(Some(action.approved_at().into()));
        match &action {
            ExpenseAction::Approve { approval_notes, .. } => {
                active.approval_notes = Set(approval_notes.clone());
            }
            ExpenseAction::Reject {
                rejection_reason, ..
            } => {
                active.rejection_reason = Set(Some(rejection_reason.clone()));
            }
        }
        active.updated_at = Set(Utc::now().into());

        let after = active.update(&txn).await.map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;

        tracing::info!(
            budget_expense_id = %after.id,
            status = %action.new_status(),
            approved_by = %action.approved_by(),
            "Budget expense decided"
        );

        Ok(Change::updated(before, after))
    }

    /// Edits a flexible expense. A provided breakdown replaces the old one.
    ///
    /// # Errors
    ///
    /// * `Forbidden` when the actor may not edit the expense
    /// * `InsufficientBudget` when the new charge is not covered
    /// * validation errors for bad fields or an oversized breakdown
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        changes: ExpenseChanges,
    ) -> AppResult<Change<BudgetExpenseDetail>> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let current = load_scoped(&txn, actor.department_id, id, true).await?;
        ApprovalStateMachine::authorize_update(&snapshot(&current), actor, &changes)?;

        let old_breakdown = breakdown_of(&txn, id).await.map_err(db_err)?;
        let old_receipts = receipts_of(&txn, ReceiptParent::BudgetExpense(id))
            .await
            .map_err(db_err)?;
        let before = BudgetExpenseDetail {
            expense: current.clone(),
            breakdown: old_breakdown.clone(),
            receipts: old_receipts.clone(),
        };

        if changes.is_empty() {
            return Err(AppError::Validation("no fields to update".to_string()));
        }

        let amount = changes.amount.unwrap_or(current.amount);
        if changes.breakdown.is_none() {
            let allocated: Decimal = old_breakdown.iter().map(|item| item.amount).sum();
            if allocated > amount {
                return Err(BudgetError::BreakdownExceedsAmount { allocated, amount }.into());
            }
        }

        if changes.affects_spend() {
            let approved = current.status == ExpenseStatus::Approved;
            if let Some(budget_id) = current.budget_id {
                lock_budget(&txn, budget_id).await.map_err(db_err)?;
                let budget = flexible::load_scoped(&txn, actor.department_id, budget_id).await?;
                let credit = if approved { current.amount } else { Decimal::ZERO };
                admit_to_budget(&txn, budget_ref(&budget), amount, credit).await?;
            } else {
                let old_category = current.category_id.map(CategoryId::from_uuid);
                let category_id = changes.category_id.or(old_category).ok_or_else(|| {
                    AppError::Validation("budget expense has no budget or category".to_string())
                })?;
                let expense_date = changes.expense_date.unwrap_or(current.expense_date);
                if Some(category_id) != old_category {
                    ensure_active(&txn, category_id).await?;
                }
                let same_key = Some(category_id) == old_category
                    && fiscal_year_of(expense_date) == fiscal_year_of(current.expense_date);
                let credit = if same_key && approved {
                    current.amount
                } else {
                    Decimal::ZERO
                };
                admit_to_category(
                    &txn,
                    actor.department_id,
                    category_id,
                    expense_date,
                    amount,
                    credit,
                )
                .await?;
            }
        } else if let Some(category_id) = changes.category_id {
            ensure_active(&txn, category_id).await?;
        }

        let mut active: budget_expenses::ActiveModel = current.into();
        if let Some(category_id) = changes.category_id {
            active.category_id = Set(Some(category_id.into_inner()));
        }
        if let Some(vendor) = changes.vendor {
            active.vendor = Set(vendor.trim().to_string());
        }
        if let Some(amount) = changes.amount {
            active.amount = Set(amount);
        }
        if let Some(expense_date) = changes.expense_date {
            active.expense_date = Set(expense_date);
        }
        if let Some(description) = changes.description {
            active.description = Set(Some(description));
        }
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(&txn).await.map_err(db_err)?;

        let breakdown = match &changes.breakdown {
            Some(items) => {
                delete_breakdown(&txn, id).await.map_err(db_err)?;
                insert_breakdown(&txn, id, items).await.map_err(db_err)?
            }
            None => old_breakdown,
        };
        txn.commit().await.map_err(db_err)?;

        tracing::info!(
            budget_expense_id = %id,
            amount = %updated.amount,
            breakdown_replaced = changes.breakdown.is_some(),
            "Budget expense updated"
        );

        Ok(Change::updated(
            before,
            BudgetExpenseDetail {
                expense: updated,
                breakdown,
                receipts: old_receipts,
            },
        ))
    }

    /// Deletes a flexible expense with its breakdown and receipts.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` when the actor may not delete the expense.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> AppResult<budget_expenses::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let expense = load_scoped(&txn, actor.department_id, id, true).await?;
        ApprovalStateMachine::authorize_delete(&snapshot(&expense), actor)?;

        let removed = delete_receipts(&txn, ReceiptParent::BudgetExpense(id))
            .await
            .map_err(db_err)?;
        delete_breakdown(&txn, id).await.map_err(db_err)?;
        budget_expenses::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;

        tracing::info!(
            budget_expense_id = %id,
            receipts_removed = removed,
            "Budget expense deleted"
        );
        Ok(expense)
    }
}
