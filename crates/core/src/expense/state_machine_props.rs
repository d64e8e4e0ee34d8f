//! Property-based tests for the approval state machine.

use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use deptledger_shared::types::{DepartmentId, UserId};

use crate::access::{Actor, Role};
use crate::expense::error::ExpenseError;
use crate::expense::state_machine::ApprovalStateMachine;
use crate::expense::types::{ExpenseChanges, ExpenseKind, ExpenseSnapshot, ExpenseStatus};

fn arb_status() -> impl Strategy<Value = ExpenseStatus> {
    prop_oneof![
        Just(ExpenseStatus::Pending),
        Just(ExpenseStatus::Approved),
        Just(ExpenseStatus::Rejected),
    ]
}

fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Admin), Just(Role::Hod), Just(Role::Staff)]
}

fn arb_uuid() -> impl Strategy<Value = Uuid> {
    any::<u128>().prop_map(Uuid::from_u128)
}

fn arb_reason() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9 ]{0,60}"
}

fn snapshot(created_by: UserId, department_id: DepartmentId, status: ExpenseStatus) -> ExpenseSnapshot {
    ExpenseSnapshot {
        id: Uuid::now_v7(),
        kind: ExpenseKind::BudgetExpense,
        department_id,
        created_by,
        status,
        amount: Decimal::ONE_HUNDRED,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// A decided expense never transitions again.
    #[test]
    fn prop_single_transition(
        approver in arb_uuid(),
        role in prop_oneof![Just(Role::Admin), Just(Role::Hod)],
        reason in arb_reason(),
    ) {
        let dept = DepartmentId::new();
        let actor = Actor::new(UserId::from_uuid(approver), dept, role);
        let pending = snapshot(UserId::new(), dept, ExpenseStatus::Pending);

        for action in [
            ApprovalStateMachine::approve(&pending, &actor, None),
            ApprovalStateMachine::reject(&pending, &actor, Some(reason.clone())),
        ] {
            let action = action.unwrap();
            let decided = ExpenseSnapshot { status: action.new_status(), ..pending };

            let again_approve = ApprovalStateMachine::approve(&decided, &actor, None);
            let again_reject = ApprovalStateMachine::reject(&decided, &actor, Some(reason.clone()));
            let approve_is_invalid_transition = matches!(again_approve, Err(ExpenseError::InvalidTransition { .. }));
            let reject_is_invalid_transition = matches!(again_reject, Err(ExpenseError::InvalidTransition { .. }));
            prop_assert!(approve_is_invalid_transition);
            prop_assert!(reject_is_invalid_transition);
        }
    }

    /// Transitions succeed only from pending and only for approvers.
    #[test]
    fn prop_transition_matrix(status in arb_status(), role in arb_role()) {
        let dept = DepartmentId::new();
        let actor = Actor::new(UserId::new(), dept, role);
        let expense = snapshot(UserId::new(), dept, status);

        let result = ApprovalStateMachine::approve(&expense, &actor, None);
        let expected_ok = role != Role::Staff && status == ExpenseStatus::Pending;
        prop_assert_eq!(result.is_ok(), expected_ok);
        if let Ok(action) = result {
            prop_assert!(ApprovalStateMachine::is_valid_transition(status, action.new_status()));
        }
    }

    /// Staff may edit exactly their own pending expenses.
    #[test]
    fn prop_staff_ownership(status in arb_status(), own in any::<bool>()) {
        let dept = DepartmentId::new();
        let staff = Actor::new(UserId::new(), dept, Role::Staff);
        let creator = if own { staff.user_id } else { UserId::new() };
        let expense = snapshot(creator, dept, status);

        let result = ApprovalStateMachine::authorize_update(&expense, &staff, &ExpenseChanges::default());
        prop_assert_eq!(result.is_ok(), own && status == ExpenseStatus::Pending);
    }
}
