//! Integration tests for the audit trail and the active fiscal year.

mod common;

use std::time::Duration;

use sea_orm::{ConnectionTrait, DbBackend, Statement};
use serde_json::json;
use uuid::Uuid;

use deptledger_core::audit::{AuditAction, AuditEvent, AuditQuery, AuditTrail, ClientInfo};
use deptledger_core::fiscal::FiscalYear;
use deptledger_db::{AuditLogRepository, FiscalYearRepository};
use deptledger_shared::types::PageRequest;

use common::{Fixture, connect_or_skip};

#[tokio::test]
async fn test_audit_query_is_newest_first_and_filtered() {
    let Some(db) = connect_or_skip().await else {
        return;
    };
    let Some(fx) = Fixture::setup(db).await else {
        return;
    };
    let repo = AuditLogRepository::new(fx.db.clone());
    let expense_id = Uuid::now_v7();

    let created = AuditEvent::new(AuditAction::ExpenseCreate, Some(expense_id))
        .by(&fx.staff)
        .new_values(json!({ "amount": "100" }))
        .client(ClientInfo {
            ip_address: Some("10.0.0.7".to_string()),
            user_agent: Some("integration-test".to_string()),
        });
    repo.append_event(&created).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let approved = AuditEvent::new(AuditAction::ExpenseApprove, Some(expense_id))
        .by(&fx.hod)
        .old(json!({ "status": "pending" }))
        .new_values(json!({ "status": "approved" }));
    repo.append_event(&approved).await.unwrap();

    let all = repo
        .query(
            &fx.admin,
            AuditQuery {
                entity_id: Some(expense_id),
                ..AuditQuery::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(all.data.len(), 2);
    assert_eq!(all.data[0].action, "expense.approve");
    assert_eq!(all.data[1].action, "expense.create");
    assert_eq!(all.data[1].ip_address.as_deref(), Some("10.0.0.7"));

    let by_action = repo
        .query(
            &fx.admin,
            AuditQuery {
                entity_id: Some(expense_id),
                action: Some("expense.create".to_string()),
                ..AuditQuery::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(by_action.data.len(), 1);
    assert_eq!(by_action.data[0].actor_id, Some(fx.staff.user_id.into_inner()));

    let unknown = repo
        .query(
            &fx.admin,
            AuditQuery {
                action: Some("expense.teleport".to_string()),
                ..AuditQuery::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(unknown.status_code(), 400);
}

#[tokio::test]
async fn test_anonymous_denials_visible_to_admins_only() {
    let Some(db) = connect_or_skip().await else {
        return;
    };
    let Some(fx) = Fixture::setup(db).await else {
        return;
    };
    let repo = AuditLogRepository::new(fx.db.clone());
    let marker = Uuid::now_v7();

    let denied = AuditEvent::new(AuditAction::AuthDenied, Some(marker))
        .new_values(json!({ "reason": "Missing authorization header" }));
    assert_eq!(denied.department_id, None);
    repo.append_event(&denied).await.unwrap();

    let filter = || AuditQuery {
        entity_id: Some(marker),
        ..AuditQuery::default()
    };
    let admin = repo
        .query(&fx.admin, filter(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(admin.data.len(), 1);
    assert_eq!(admin.data[0].action, "auth.denied");
    assert_eq!(admin.data[0].department_id, None);

    let hod = repo
        .query(&fx.hod, filter(), PageRequest::default())
        .await
        .unwrap();
    assert!(hod.data.is_empty());
}

#[tokio::test]
async fn test_audit_rows_cannot_be_modified() {
    let Some(db) = connect_or_skip().await else {
        return;
    };
    let Some(fx) = Fixture::setup(db).await else {
        return;
    };
    let row = AuditLogRepository::new(fx.db.clone())
        .append_event(&AuditEvent::new(AuditAction::CategoryCreate, None).by(&fx.admin))
        .await
        .unwrap();

    let update = fx
        .db
        .execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE audit_logs SET action = 'category.update' WHERE id = $1",
            [row.id.into()],
        ))
        .await;
    assert!(update.is_err());

    let delete = fx
        .db
        .execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            "DELETE FROM audit_logs WHERE id = $1",
            [row.id.into()],
        ))
        .await;
    assert!(delete.is_err());
}

#[tokio::test]
async fn test_trail_listener_persists_emitted_events() {
    let Some(db) = connect_or_skip().await else {
        return;
    };
    let Some(fx) = Fixture::setup(db).await else {
        return;
    };
    let repo = AuditLogRepository::new(fx.db.clone());
    let (trail, listener) = AuditTrail::spawn(repo.clone());
    let entity_id = Uuid::now_v7();

    trail.emit(AuditEvent::new(AuditAction::BudgetCreate, Some(entity_id)).by(&fx.hod));
    drop(trail);
    listener.await.unwrap();

    let page = repo
        .query(
            &fx.hod,
            AuditQuery {
                entity_id: Some(entity_id),
                ..AuditQuery::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].entity_type, "budget");
}

#[tokio::test]
async fn test_activation_replaces_active_fiscal_year() {
    let Some(db) = connect_or_skip().await else {
        return;
    };
    let Some(fx) = Fixture::setup(db).await else {
        return;
    };
    let repo = FiscalYearRepository::new(fx.db.clone());
    let dept = fx.admin.department_id;

    assert_eq!(repo.active(dept).await.unwrap(), None);
    assert_eq!(
        repo.resolve(dept, None).await.unwrap(),
        FiscalYear::current()
    );

    let first = repo.activate(&fx.admin, FiscalYear::starting(2024)).await.unwrap();
    assert_eq!(first.before, None);

    let second = repo.activate(&fx.hod, FiscalYear::starting(2025)).await.unwrap();
    assert_eq!(second.before, Some(FiscalYear::starting(2024)));
    assert_eq!(
        repo.active(dept).await.unwrap(),
        Some(FiscalYear::starting(2025))
    );
    assert_eq!(
        repo.resolve(dept, None).await.unwrap(),
        FiscalYear::starting(2025)
    );
    assert_eq!(
        repo.resolve(dept, Some(FiscalYear::starting(2023)))
            .await
            .unwrap(),
        FiscalYear::starting(2023)
    );

    let staff = repo
        .activate(&fx.staff, FiscalYear::starting(2026))
        .await
        .unwrap_err();
    assert_eq!(staff.status_code(), 403);
}
