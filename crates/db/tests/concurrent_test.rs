//! Concurrency tests for upserts, approvals, guarded edits and fiscal-year
//! activation.

mod common;

use std::sync::Arc;

use futures::future::join_all;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use tokio::sync::Barrier;

use deptledger_core::budget::UpsertAllotmentInput;
use deptledger_core::expense::{ExpenseChanges, StatusDecision};
use deptledger_core::fiscal::FiscalYear;
use deptledger_db::entities::{budget_allotments, department_fiscal_years};
use deptledger_db::{BudgetRepository, FiscalYearRepository, ReconciliationRepository};

use common::{Fixture, connect_or_skip, date};

const WORKERS: usize = 16;

#[tokio::test]
async fn test_concurrent_allotment_upserts_keep_one_row() {
    let Some(db) = connect_or_skip().await else {
        return;
    };
    let Some(fx) = Fixture::setup(db).await else {
        return;
    };
    let fy = FiscalYear::starting(2024);
    let repo = BudgetRepository::new(fx.db.clone());
    let barrier = Arc::new(Barrier::new(WORKERS));

    let tasks = (1..=WORKERS).map(|i| {
        let repo = repo.clone();
        let barrier = barrier.clone();
        let admin = fx.admin;
        let category_id = fx.category;
        tokio::spawn(async move {
            barrier.wait().await;
            repo.upsert_allotment(
                &admin,
                UpsertAllotmentInput {
                    category_id,
                    fiscal_year: fy,
                    allotted_amount: rust_decimal::Decimal::from(i * 100),
                    notes: None,
                },
            )
            .await
        })
    });

    for result in join_all(tasks).await {
        result.expect("task panicked").expect("upsert failed");
    }

    let rows = budget_allotments::Entity::find()
        .filter(budget_allotments::Column::DepartmentId.eq(fx.admin.department_id.into_inner()))
        .filter(budget_allotments::Column::CategoryId.eq(fx.category.into_inner()))
        .filter(budget_allotments::Column::FiscalYear.eq(fy.to_string()))
        .count(&fx.db)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_concurrent_approvals_succeed_once() {
    let Some(db) = connect_or_skip().await else {
        return;
    };
    let Some(fx) = Fixture::setup(db).await else {
        return;
    };
    fx.allot(FiscalYear::starting(2024), dec!(1000)).await;
    let created = fx
        .expenses()
        .create(&fx.staff, fx.expense(dec!(100), date(2024, 10, 2)))
        .await
        .unwrap();
    let id = created.expense.id;
    let barrier = Arc::new(Barrier::new(WORKERS));

    let tasks = (0..WORKERS).map(|i| {
        let expenses = fx.expenses();
        let barrier = barrier.clone();
        let approver = if i % 2 == 0 { fx.hod } else { fx.admin };
        tokio::spawn(async move {
            barrier.wait().await;
            expenses
                .decide(&approver, id, StatusDecision::Approve { notes: None })
                .await
        })
    });

    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.expect("task panicked"))
        .collect();

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.error_code(), "INVALID_STATE");
    }
}

#[tokio::test]
async fn test_concurrent_raises_cannot_overspend_allotment() {
    let Some(db) = connect_or_skip().await else {
        return;
    };
    let Some(fx) = Fixture::setup(db).await else {
        return;
    };
    let fy = FiscalYear::starting(2024);
    fx.allot(fy, dec!(1000)).await;

    let mut ids = Vec::new();
    for _ in 0..2 {
        let created = fx
            .expenses()
            .create(&fx.staff, fx.expense(dec!(400), date(2024, 8, 5)))
            .await
            .unwrap();
        fx.expenses()
            .decide(&fx.hod, created.expense.id, StatusDecision::Approve { notes: None })
            .await
            .unwrap();
        ids.push(created.expense.id);
    }

    let barrier = Arc::new(Barrier::new(ids.len()));
    let tasks = ids.iter().map(|&id| {
        let expenses = fx.expenses();
        let barrier = barrier.clone();
        let hod = fx.hod;
        tokio::spawn(async move {
            barrier.wait().await;
            expenses
                .update(
                    &hod,
                    id,
                    ExpenseChanges {
                        amount: Some(dec!(550)),
                        ..ExpenseChanges::default()
                    },
                )
                .await
        })
    });

    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.expect("task panicked"))
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let err = results
        .iter()
        .find_map(|r| r.as_ref().err())
        .expect("one raise refused");
    assert_eq!(err.error_code(), "INSUFFICIENT_BUDGET");

    let figures = ReconciliationRepository::new(fx.db.clone())
        .figures_for(fx.staff.department_id, fx.category, fy)
        .await
        .unwrap();
    assert_eq!(figures.spent, dec!(950));
    assert!(figures.spent <= figures.allotted);
}

#[tokio::test]
async fn test_concurrent_activation_leaves_one_active_year() {
    let Some(db) = connect_or_skip().await else {
        return;
    };
    let Some(fx) = Fixture::setup(db).await else {
        return;
    };
    let repo = FiscalYearRepository::new(fx.db.clone());
    let barrier = Arc::new(Barrier::new(WORKERS));

    let tasks = (0..WORKERS).map(|i| {
        let repo = repo.clone();
        let barrier = barrier.clone();
        let admin = fx.admin;
        let fy = FiscalYear::starting(2020 + i32::try_from(i % 4).unwrap());
        tokio::spawn(async move {
            barrier.wait().await;
            repo.activate(&admin, fy).await
        })
    });

    for result in join_all(tasks).await {
        result.expect("task panicked").expect("activation failed");
    }

    let active = department_fiscal_years::Entity::find()
        .filter(
            department_fiscal_years::Column::DepartmentId.eq(fx.admin.department_id.into_inner()),
        )
        .filter(department_fiscal_years::Column::IsActive.eq(true))
        .count(&fx.db)
        .await
        .unwrap();
    assert_eq!(active, 1);
}
