//! Receipt metadata repository. File bytes live in external storage.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    ModelTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use uuid::Uuid;

use deptledger_core::access::{Actor, Permission};
use deptledger_core::expense::{ApprovalStateMachine, ExpenseSnapshot, ReceiptInput};
use deptledger_shared::types::{DepartmentId, UserId};
use deptledger_shared::{AppError, AppResult};

use super::common::db_err;
use super::{budget_expense, expense};
use crate::entities::receipts;

/// The expense a receipt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ReceiptParent {
    /// Category-bound expense.
    Expense(Uuid),
    /// Flexible budget expense.
    BudgetExpense(Uuid),
}

impl ReceiptParent {
    fn of(model: &receipts::Model) -> Option<Self> {
        match (model.expense_id, model.budget_expense_id) {
            (Some(id), None) => Some(Self::Expense(id)),
            (None, Some(id)) => Some(Self::BudgetExpense(id)),
            _ => None,
        }
    }

    fn condition(self) -> Condition {
        match self {
            Self::Expense(id) => Condition::all().add(receipts::Column::ExpenseId.eq(id)),
            Self::BudgetExpense(id) => {
                Condition::all().add(receipts::Column::BudgetExpenseId.eq(id))
            }
        }
    }
}

/// Inserts receipt rows for a parent inside the caller's transaction.
pub(crate) async fn insert_receipts<C: ConnectionTrait>(
    conn: &C,
    department_id: DepartmentId,
    parent: ReceiptParent,
    uploaded_by: UserId,
    inputs: &[ReceiptInput],
) -> Result<Vec<receipts::Model>, DbErr> {
    let mut inserted = Vec::with_capacity(inputs.len());
    for input in inputs {
        let (expense_id, budget_expense_id) = match parent {
            ReceiptParent::Expense(id) => (Some(id), None),
            ReceiptParent::BudgetExpense(id) => (None, Some(id)),
        };
        let model = receipts::ActiveModel {
            id: Set(Uuid::now_v7()),
            department_id: Set(department_id.into_inner()),
            expense_id: Set(expense_id),
            budget_expense_id: Set(budget_expense_id),
            file_name: Set(input.file_name.trim().to_string()),
            file_url: Set(input.file_url.trim().to_string()),
            content_type: Set(input.content_type.clone()),
            size_bytes: Set(input.size_bytes),
            uploaded_by: Set(uploaded_by.into_inner()),
            created_at: Set(Utc::now().into()),
        };
        inserted.push(model.insert(conn).await?);
    }
    Ok(inserted)
}

/// Removes every receipt of a parent inside the caller's transaction.
pub(crate) async fn delete_receipts<C: ConnectionTrait>(
    conn: &C,
    parent: ReceiptParent,
) -> Result<u64, DbErr> {
    let result = receipts::Entity::delete_many()
        .filter(parent.condition())
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Lists a parent's receipts in upload order.
pub(crate) async fn receipts_of<C: ConnectionTrait>(
    conn: &C,
    parent: ReceiptParent,
) -> Result<Vec<receipts::Model>, DbErr> {
    receipts::Entity::find()
        .filter(parent.condition())
        .order_by_asc(receipts::Column::CreatedAt)
        .all(conn)
        .await
}

async fn parent_snapshot<C: ConnectionTrait>(
    conn: &C,
    department_id: DepartmentId,
    parent: ReceiptParent,
) -> AppResult<ExpenseSnapshot> {
    match parent {
        ReceiptParent::Expense(id) => {
            let model = expense::load_scoped(conn, department_id, id, true).await?;
            Ok(expense::snapshot(&model))
        }
        ReceiptParent::BudgetExpense(id) => {
            let model = budget_expense::load_scoped(conn, department_id, id, true).await?;
            Ok(budget_expense::snapshot(&model))
        }
    }
}

/// Receipt repository.
#[derive(Debug, Clone)]
pub struct ReceiptRepository {
    db: DatabaseConnection,
}

impl ReceiptRepository {
    /// Creates a new receipt repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Attaches receipt metadata to an expense the actor may edit.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown parent, `Forbidden` when the actor
    /// may not edit it, and a validation error for incomplete metadata.
    pub async fn attach(
        &self,
        actor: &Actor,
        parent: ReceiptParent,
        input: ReceiptInput,
    ) -> AppResult<receipts::Model> {
        actor.require(Permission::Create)?;
        input.validate()?;

        let txn = self.db.begin().await.map_err(db_err)?;
        let snapshot = parent_snapshot(&txn, actor.department_id, parent).await?;
        ApprovalStateMachine::authorize_receipt_attach(&snapshot, actor)?;

        let mut inserted = insert_receipts(
            &txn,
            actor.department_id,
            parent,
            actor.user_id,
            std::slice::from_ref(&input),
        )
        .await
        .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;

        let receipt = inserted
            .pop()
            .ok_or_else(|| AppError::Internal("receipt insert returned no row".to_string()))?;
        tracing::info!(receipt_id = %receipt.id, parent = ?parent, "Receipt attached");
        Ok(receipt)
    }

    /// Removes a receipt.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown receipt and `Forbidden` or
    /// `InvalidState` when the parent no longer allows it.
    pub async fn delete(&self, actor: &Actor, receipt_id: Uuid) -> AppResult<receipts::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let receipt = receipts::Entity::find_by_id(receipt_id)
            .filter(receipts::Column::DepartmentId.eq(actor.department_id.into_inner()))
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| AppError::NotFound(format!("Receipt {receipt_id} not found")))?;

        let parent = ReceiptParent::of(&receipt)
            .ok_or_else(|| AppError::Internal(format!("Receipt {receipt_id} has no parent")))?;
        let snapshot = parent_snapshot(&txn, actor.department_id, parent).await?;
        ApprovalStateMachine::authorize_receipt_delete(&snapshot, actor)?;

        receipt.clone().delete(&txn).await.map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;

        tracing::info!(receipt_id = %receipt_id, parent = ?parent, "Receipt deleted");
        Ok(receipt)
    }

    /// Lists receipts of an expense in the caller's department.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown parent.
    pub async fn list_for(
        &self,
        department_id: DepartmentId,
        parent: ReceiptParent,
    ) -> AppResult<Vec<receipts::Model>> {
        match parent {
            ReceiptParent::Expense(id) => {
                expense::load_scoped(&self.db, department_id, id, false).await?;
            }
            ReceiptParent::BudgetExpense(id) => {
                budget_expense::load_scoped(&self.db, department_id, id, false).await?;
            }
        }
        receipts_of(&self.db, parent).await.map_err(db_err)
    }
}
