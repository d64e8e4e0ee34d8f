//! `SeaORM` Entity for budget_expense_breakdowns table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "budget_expense_breakdowns")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub budget_expense_id: Uuid,
    pub name: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount: Decimal,
    pub payment_method: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::budget_expenses::Entity",
        from = "Column::BudgetExpenseId",
        to = "super::budget_expenses::Column::Id"
    )]
    BudgetExpenses,
}

impl Related<super::budget_expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BudgetExpenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
