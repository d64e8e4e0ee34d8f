//! `SeaORM` Entity for receipts table.
//!
//! A receipt belongs to exactly one of `expense_id` / `budget_expense_id`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "receipts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub department_id: Uuid,
    pub expense_id: Option<Uuid>,
    pub budget_expense_id: Option<Uuid>,
    pub file_name: String,
    pub file_url: String,
    pub content_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub uploaded_by: Uuid,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::expenses::Entity",
        from = "Column::ExpenseId",
        to = "super::expenses::Column::Id"
    )]
    Expenses,
    #[sea_orm(
        belongs_to = "super::budget_expenses::Entity",
        from = "Column::BudgetExpenseId",
        to = "super::budget_expenses::Column::Id"
    )]
    BudgetExpenses,
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl Related<super::budget_expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BudgetExpenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
