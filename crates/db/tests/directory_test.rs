//! Integration tests for departments and users.

mod common;

use uuid::Uuid;

use deptledger_core::access::Role;
use deptledger_db::repositories::{CreateUser, actor_of};
use deptledger_db::{DepartmentRepository, UserRepository};
use deptledger_shared::types::{DepartmentId, UserId};

use common::connect_or_skip;

#[tokio::test]
async fn test_department_and_user_lookup() {
    let Some(db) = connect_or_skip().await else {
        return;
    };
    let departments = DepartmentRepository::new(db.clone());
    let users = UserRepository::new(db);

    let name = format!("Physics {}", Uuid::new_v4());
    let department = departments.create(&name).await.expect("create department");
    let department_id = DepartmentId::from_uuid(department.id);

    assert_eq!(departments.find(department_id).await.unwrap().name, name);
    assert_eq!(
        departments.find_by_name(&name).await.unwrap().map(|d| d.id),
        Some(department.id)
    );
    let missing = departments.find(DepartmentId::new()).await.unwrap_err();
    assert_eq!(missing.status_code(), 404);

    let email = format!("HoD-{}@Example.com", Uuid::new_v4());
    let user = users
        .create(CreateUser {
            department_id,
            full_name: "Head of Physics".to_string(),
            email: email.clone(),
            role: Role::Hod,
        })
        .await
        .expect("create user");

    let found = users.find(UserId::from_uuid(user.id)).await.unwrap();
    assert_eq!(found.department_id, department.id);
    let by_email = users
        .find_by_email(&email)
        .await
        .unwrap()
        .expect("lookup ignores case");
    assert_eq!(by_email.id, user.id);

    let actor = actor_of(&found);
    assert_eq!(actor.role, Role::Hod);
    assert_eq!(actor.department_id, department_id);

    let duplicate = users
        .create(CreateUser {
            department_id,
            full_name: "Someone Else".to_string(),
            email,
            role: Role::Staff,
        })
        .await
        .unwrap_err();
    assert_eq!(duplicate.status_code(), 400);
}
