//! `SeaORM` Entity for budgets table (flexible budget instances).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub department_id: Uuid,
    pub category_id: Option<Uuid>,
    pub name: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount: Decimal,
    pub source: Option<String>,
    pub payment_method: Option<String>,
    pub budget_date: Date,
    pub fiscal_year: String,
    pub created_by: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::budget_breakdowns::Entity")]
    BudgetBreakdowns,
    #[sea_orm(has_many = "super::budget_expenses::Entity")]
    BudgetExpenses,
}

impl Related<super::budget_breakdowns::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BudgetBreakdowns.def()
    }
}

impl Related<super::budget_expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BudgetExpenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
