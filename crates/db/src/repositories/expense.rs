//! Category-bound expense repository.
//!
//! Creation and spend-affecting edits run the availability guard inside a
//! transaction that first takes the advisory lock for the
//! (department, category, fiscal year) key, so two concurrent admits can
//! never both spend the same remaining balance.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use uuid::Uuid;

use deptledger_core::access::{Actor, Permission};
use deptledger_core::budget::{Admission, AvailabilityGuard};
use deptledger_core::expense::{
    ApprovalStateMachine, CreateExpenseInput, ExpenseAction, ExpenseChanges, ExpenseError,
    ExpenseKind, ExpensePredicate, ExpenseSnapshot, StatusDecision,
};
use deptledger_core::fiscal::fiscal_year_of;
use deptledger_shared::types::{CategoryId, DepartmentId, PageRequest, PageResponse, UserId};
use deptledger_shared::{AppError, AppResult};

use super::category::ensure_active;
use super::common::{Change, advisory_xact_lock, category_lock_key, db_err};
use super::filter::expense_condition;
use super::receipt::{ReceiptParent, delete_receipts, insert_receipts, receipts_of};
use super::reconciliation::category_figures;
use crate::entities::sea_orm_active_enums::ExpenseStatus;
use crate::entities::{expenses, receipts};

/// An expense together with its receipts.
#[derive(Debug, Clone, Serialize)]
pub struct ExpenseWithReceipts {
    /// The expense row.
    #[serde(flatten)]
    pub expense: expenses::Model,
    /// Attached receipt metadata.
    pub receipts: Vec<receipts::Model>,
}

/// Loads an expense visible to `department_id`, optionally `FOR UPDATE`.
pub(crate) async fn load_scoped<C: ConnectionTrait>(
    conn: &C,
    department_id: DepartmentId,
    id: Uuid,
    for_update: bool,
) -> AppResult<expenses::Model> {
    let mut query = expenses::Entity::find_by_id(id)
        .filter(expenses::Column::DepartmentId.eq(department_id.into_inner()));
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
pub(crate) fn snapshot(model: &expenses::Model) -> ExpenseSnapshot {
    ExpenseSnapshot {
        id: model.id,
        kind: ExpenseKind::Expense,
        department_id: DepartmentId::from_uuid(model.department_id),
        created_by: UserId::from_uuid(model.created_by),
        status: model.status.into(),
        amount: model.amount,
    }
}

/// Runs the guard for `amount` against the category's fiscal year,
/// holding the key's advisory lock until the caller's transaction ends.
/// `credit` is added back to the remaining balance.
pub(crate) async fn admit_to_category<C: ConnectionTrait>(
    conn: &C,
    department_id: DepartmentId,
    category_id: CategoryId,
    expense_date: NaiveDate,
    amount: Decimal,
    credit: Decimal,
) -> AppResult<Admission> {
    let fiscal_year = fiscal_year_of(expense_date);
    advisory_xact_lock(conn, &category_lock_key(department_id, category_id, fiscal_year))
        .await
        .map_err(db_err)?;

    let figures = category_figures(conn, department_id, category_id, fiscal_year)
        .await
        .map_err(db_err)?;

    let remaining = figures.remaining + credit;
    AvailabilityGuard::check_remaining(remaining, amount).map_err(|err| {
        tracing::warn!(
            %department_id,
            %category_id,
            %fiscal_year,
            %remaining,
            requested = %amount,
            "Expense rejected by availability check"
        );
        err.into()
    })
}

/// Expense repository.
#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    db: DatabaseConnection,
}

impl ExpenseRepository {
    /// Creates a new expense repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Records a pending expense if the category's remaining balance covers
    /// it. The expense and its receipts are written in one transaction.
    ///
    /// # Errors
    ///
    /// * `Forbidden` without the create capability
    /// * `InsufficientBudget` when the amount exceeds the remaining balance
    /// * `NotFound` / validation errors for a bad category or input
    pub async fn create(
        &self,
        actor: &Actor,
        input: CreateExpenseInput,
    ) -> AppResult<ExpenseWithReceipts> {
        actor.require(Permission::Create)?;
        input.validate()?;

        let txn = self.db.begin().await.map_err(db_err)?;
        ensure_active(&txn, input.category_id).await?;

        let admission = admit_to_category(
            &txn,
            actor.department_id,
            input.category_id,
            input.expense_date,
            input.amount,
            Decimal::ZERO,
        )
        .await?;

        let now = Utc::now().into();
        let model = expenses::ActiveModel {
            id: Set(Uuid::now_v7()),
            department_id: Set(actor.department_id.into_inner()),
            category_id: Set(input.category_id.into_inner()),
            event_id: Set(input.event_id),
            vendor: Set(input.vendor.trim().to_string()),
            amount: Set(input.amount),
            expense_date: Set(input.expense_date),
            description: Set(input.description),
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

        let receipts = insert_receipts(
            &txn,
            actor.department_id,
            ReceiptParent::Expense(expense.id),
            actor.user_id,
            &input.receipts,
        )
        .await
        .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;

        tracing::info!(
            expense_id = %expense.id,
            category_id = %expense.category_id,
            amount = %expense.amount,
            remaining_after = %admission.remaining_after(),
            receipts = receipts.len(),
            "Expense created"
        );

        Ok(ExpenseWithReceipts { expense, receipts })
    }

    /// Gets an expense with its receipts.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the expense is absent or in another department.
    pub async fn find(
        &self,
        department_id: DepartmentId,
        id: Uuid,
    ) -> AppResult<ExpenseWithReceipts> {
        let expense = load_scoped(&self.db, department_id, id, false).await?;
        let receipts = receipts_of(&self.db, ReceiptParent::Expense(id))
            .await
            .map_err(db_err)?;
        Ok(ExpenseWithReceipts { expense, receipts })
    }

    /// Lists expenses matching every predicate, newest first.
    ///
    /// # Errors
    ///
    /// Returns a validation error for predicates that do not apply to
    /// category-bound expenses.
    pub async fn list(
        &self,
        department_id: DepartmentId,
        predicates: &[ExpensePredicate],
        page: PageRequest,
    ) -> AppResult<PageResponse<expenses::Model>> {
        let query = expenses::Entity::find().filter(expense_condition(department_id, predicates)?);

        let total = query.clone().count(&self.db).await.map_err(db_err)?;
        let data = query
            .order_by_desc(expenses::Column::CreatedAt)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(PageResponse::new(data, page.page, page.per_page, total))
    }

    /// Approves or rejects a pending expense.
    ///
    /// # Errors
    ///
    /// * `Forbidden` without the approve capability
    /// * `InvalidState` unless the expense is pending
    /// * a validation error when rejecting without a reason
    pub async fn decide(
        &self,
        actor: &Actor,
        id: Uuid,
        decision: StatusDecision,
    ) -> AppResult<Change<expenses::Model>> {
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
                expense_id = %id,
                actor = %actor.user_id,
                error = %err,
                "Expense decision refused"
            );
        })?;

        let mut active: expenses::ActiveModel = before.clone().into();
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
            expense_id = %after.id,
            status = %action.new_status(),
            approved_by = %action.approved_by(),
            "Expense decided"
        );

        Ok(Change::updated(before, after))
    }

    /// Edits an expense's fields. Changing its category, amount or date
    /// re-runs the availability check; an approved expense staying under
    /// the same key is credited with its own amount.
    ///
    /// # Errors
    ///
    /// * `Forbidden` when the actor may not edit the expense
    /// * `InsufficientBudget` when the new charge is not covered
    /// * validation errors for bad fields
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        changes: ExpenseChanges,
    ) -> AppResult<Change<expenses::Model>> {
        if changes.breakdown.is_some() {
            return Err(AppError::Validation(
                "breakdown applies to budget expenses only".to_string(),
            ));
        }

        let txn = self.db.begin().await.map_err(db_err)?;
        let before = load_scoped(&txn, actor.department_id, id, true).await?;
        ApprovalStateMachine::authorize_update(&snapshot(&before), actor, &changes)?;

        if changes.is_empty() {
            return Err(AppError::Validation("no fields to update".to_string()));
        }

        if changes.affects_spend() {
            let old_category = CategoryId::from_uuid(before.category_id);
            let category_id = changes.category_id.unwrap_or(old_category);
            let expense_date = changes.expense_date.unwrap_or(before.expense_date);
            let amount = changes.amount.unwrap_or(before.amount);

            if category_id != old_category {
                ensure_active(&txn, category_id).await?;
            }

            let same_key = category_id == old_category
                && fiscal_year_of(expense_date) == fiscal_year_of(before.expense_date);
            let credit = if same_key && before.status == ExpenseStatus::Approved {
                before.amount
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

        let mut active: expenses::ActiveModel = before.clone().into();
        if let Some(category_id) = changes.category_id {
            active.category_id = Set(category_id.into_inner());
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

        let after = active.update(&txn).await.map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;

        tracing::info!(expense_id = %after.id, amount = %after.amount, "Expense updated");
        Ok(Change::updated(before, after))
    }

    /// Deletes an expense and its receipts in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` when the actor may not delete the expense.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> AppResult<expenses::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let expense = load_scoped(&txn, actor.department_id, id, true).await?;
        ApprovalStateMachine::authorize_delete(&snapshot(&expense), actor)?;

        let removed = delete_receipts(&txn, ReceiptParent::Expense(id))
            .await
            .map_err(db_err)?;
        expenses::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;

        tracing::info!(expense_id = %id, receipts_removed = removed, "Expense deleted");
        Ok(expense)
    }
}
