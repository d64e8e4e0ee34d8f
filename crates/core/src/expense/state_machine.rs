//! Approval state machine and ownership rules for expenses.
//!
//! Both expense models share these rules. The store loads the expense
//! scoped to the actor's department, asks the state machine for a decision,
//! then persists the returned action.

use chrono::Utc;

use super::error::ExpenseError;
use super::types::{ExpenseAction, ExpenseChanges, ExpenseSnapshot, ExpenseStatus};
use crate::access::{Actor, Permission, Role};

/// Stateless service for expense transitions and ownership checks.
pub struct ApprovalStateMachine;

impl ApprovalStateMachine {
    /// Rejects access to an expense in another department.
    ///
    /// # Errors
    ///
    /// Returns `ExpenseError::NotFound` when departments differ.
    pub fn ensure_visible(expense: &ExpenseSnapshot, actor: &Actor) -> Result<(), ExpenseError> {
        if expense.department_id == actor.department_id {
            Ok(())
        } else {
            Err(ExpenseError::NotFound(expense.id))
        }
    }

    /// Approve a pending expense.
    ///
    /// # Errors
    ///
    /// * `ExpenseError::Access` without the approve capability
    /// * `ExpenseError::InvalidTransition` unless the expense is pending
    pub fn approve(
        expense: &ExpenseSnapshot,
        actor: &Actor,
        approval_notes: Option<String>,
    ) -> Result<ExpenseAction, ExpenseError> {
        Self::ensure_visible(expense, actor)?;
        actor.require(Permission::Approve)?;

        match expense.status {
            ExpenseStatus::Pending => Ok(ExpenseAction::Approve {
                approved_by: actor.user_id,
                approved_at: Utc::now(),
                approval_notes: approval_notes.filter(|n| !n.trim().is_empty()),
            }),
            from => Err(ExpenseError::InvalidTransition {
                from,
                to: ExpenseStatus::Approved,
            }),
        }
    }

    /// Reject a pending expense.
    ///
    /// # Errors
    ///
    /// * `ExpenseError::Access` without the approve capability
    /// * `ExpenseError::InvalidTransition` unless the expense is pending
    /// * `ExpenseError::RejectionReasonRequired` if the reason is blank
    pub fn reject(
        expense: &ExpenseSnapshot,
        actor: &Actor,
        rejection_reason: Option<String>,
    ) -> Result<ExpenseAction, ExpenseError> {
        Self::ensure_visible(expense, actor)?;
        actor.require(Permission::Approve)?;

        if expense.status != ExpenseStatus::Pending {
            return Err(ExpenseError::InvalidTransition {
                from: expense.status,
                to: ExpenseStatus::Rejected,
            });
        }

        let reason = rejection_reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .ok_or(ExpenseError::RejectionReasonRequired)?;

        Ok(ExpenseAction::Reject {
            approved_by: actor.user_id,
            approved_at: Utc::now(),
            rejection_reason: reason,
        })
    }

    /// Decide whether `actor` may apply `changes`.
    ///
    /// Staff may edit only their own pending expenses. Roles holding the
    /// update capability may edit any expense in their department.
    ///
    /// # Errors
    ///
    /// * `ExpenseError::NotOwner` for staff editing someone else's expense
    /// * `ExpenseError::NotPending` for staff editing a decided expense
    /// * validation errors from [`ExpenseChanges::validate`]
    pub fn authorize_update(
        expense: &ExpenseSnapshot,
        actor: &Actor,
        changes: &ExpenseChanges,
    ) -> Result<(), ExpenseError> {
        Self::ensure_visible(expense, actor)?;

        if !actor.can(Permission::Update) {
            Self::require_owner_while_pending(expense, actor)?;
        }

        changes.validate(expense.amount)
    }

    /// Decide whether `actor` may delete the expense.
    ///
    /// Admins may always delete. Staff may delete their own pending
    /// expenses. Other roles without the delete capability are refused.
    ///
    /// # Errors
    ///
    /// * `ExpenseError::Access` for roles that neither delete nor own
    /// * `ExpenseError::NotOwner` / `ExpenseError::NotPending` for staff
    pub fn authorize_delete(expense: &ExpenseSnapshot, actor: &Actor) -> Result<(), ExpenseError> {
        Self::ensure_visible(expense, actor)?;

        if actor.can(Permission::Delete) {
            return Ok(());
        }
        if actor.role != Role::Staff {
            actor.require(Permission::Delete)?;
        }
        Self::require_owner_while_pending(expense, actor)
    }

    /// Decide whether `actor` may attach a receipt to the expense.
    ///
    /// # Errors
    ///
    /// Same rules as [`ApprovalStateMachine::authorize_update`].
    pub fn authorize_receipt_attach(
        expense: &ExpenseSnapshot,
        actor: &Actor,
    ) -> Result<(), ExpenseError> {
        Self::authorize_update(expense, actor, &ExpenseChanges::default())
    }

    /// Decide whether `actor` may remove a receipt from the expense.
    ///
    /// Allowed while the parent is pending for its submitter or any role
    /// with the update capability. Admins may remove receipts at any time.
    ///
    /// # Errors
    ///
    /// * `ExpenseError::NotPending` once the parent is decided
    /// * `ExpenseError::NotOwner` for staff on someone else's expense
    pub fn authorize_receipt_delete(
        expense: &ExpenseSnapshot,
        actor: &Actor,
    ) -> Result<(), ExpenseError> {
        Self::ensure_visible(expense, actor)?;

        if actor.is_admin() {
            return Ok(());
        }
        if !expense.status.is_pending() {
            return Err(ExpenseError::NotPending(expense.status));
        }
        if actor.can(Permission::Update) || expense.created_by == actor.user_id {
            Ok(())
        } else {
            Err(ExpenseError::NotOwner)
        }
    }

    /// Check if a status transition is valid.
    #[must_use]
    pub const fn is_valid_transition(from: ExpenseStatus, to: ExpenseStatus) -> bool {
        matches!(
            (from, to),
            (
                ExpenseStatus::Pending,
                ExpenseStatus::Approved | ExpenseStatus::Rejected
            )
        )
    }

    fn require_owner_while_pending(
        expense: &ExpenseSnapshot,
        actor: &Actor,
    ) -> Result<(), ExpenseError> {
        if expense.created_by != actor.user_id {
            return Err(ExpenseError::NotOwner);
        }
        if !expense.status.is_pending() {
            return Err(ExpenseError::NotPending(expense.status));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessError;
    use crate::expense::types::ExpenseKind;
    use deptledger_shared::types::{DepartmentId, UserId};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn actor(role: Role, department_id: DepartmentId) -> Actor {
        Actor::new(UserId::new(), department_id, role)
    }

    fn expense(created_by: UserId, department_id: DepartmentId, status: ExpenseStatus) -> ExpenseSnapshot {
        ExpenseSnapshot {
            id: Uuid::now_v7(),
            kind: ExpenseKind::Expense,
            department_id,
            created_by,
            status,
            amount: dec!(1500),
        }
    }

    #[test]
    fn test_approve_pending() {
        let dept = DepartmentId::new();
        let hod = actor(Role::Hod, dept);
        let staff = actor(Role::Staff, dept);
        let e = expense(staff.user_id, dept, ExpenseStatus::Pending);

        let action = ApprovalStateMachine::approve(&e, &hod, Some("Looks fine".into())).unwrap();
        assert_eq!(action.new_status(), ExpenseStatus::Approved);
        assert_eq!(action.approved_by(), hod.user_id);
        if let ExpenseAction::Approve { approval_notes, .. } = action {
            assert_eq!(approval_notes.as_deref(), Some("Looks fine"));
        }
    }

    #[test]
    fn test_approve_twice_is_invalid_state() {
        let dept = DepartmentId::new();
        let hod = actor(Role::Hod, dept);
        let e = expense(UserId::new(), dept, ExpenseStatus::Approved);

        assert_eq!(
            ApprovalStateMachine::approve(&e, &hod, None),
            Err(ExpenseError::InvalidTransition {
                from: ExpenseStatus::Approved,
                to: ExpenseStatus::Approved
            })
        );
    }

    #[test]
    fn test_staff_cannot_approve() {
        let dept = DepartmentId::new();
        let staff = actor(Role::Staff, dept);
        let e = expense(staff.user_id, dept, ExpenseStatus::Pending);

        assert!(matches!(
            ApprovalStateMachine::approve(&e, &staff, None),
            Err(ExpenseError::Access(AccessError::MissingPermission { .. }))
        ));
    }

    #[test]
    fn test_reject_requires_reason() {
        let dept = DepartmentId::new();
        let hod = actor(Role::Hod, dept);
        let e = expense(UserId::new(), dept, ExpenseStatus::Pending);

        assert_eq!(
            ApprovalStateMachine::reject(&e, &hod, None),
            Err(ExpenseError::RejectionReasonRequired)
        );
        assert_eq!(
            ApprovalStateMachine::reject(&e, &hod, Some("   ".into())),
            Err(ExpenseError::RejectionReasonRequired)
        );

        let action = ApprovalStateMachine::reject(&e, &hod, Some(" Duplicate bill ".into())).unwrap();
        assert_eq!(
            action,
            ExpenseAction::Reject {
                approved_by: hod.user_id,
                approved_at: action.approved_at(),
                rejection_reason: "Duplicate bill".into()
            }
        );
    }

    #[test]
    fn test_reject_rejected_is_invalid_state() {
        let dept = DepartmentId::new();
        let admin = actor(Role::Admin, dept);
        let e = expense(UserId::new(), dept, ExpenseStatus::Rejected);
        assert!(matches!(
            ApprovalStateMachine::reject(&e, &admin, Some("again".into())),
            Err(ExpenseError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_staff_updates_own_pending_only() {
        let dept = DepartmentId::new();
        let staff = actor(Role::Staff, dept);
        let other = actor(Role::Staff, dept);
        let changes = ExpenseChanges {
            description: Some("Fixed typo".into()),
            ..Default::default()
        };

        let own_pending = expense(staff.user_id, dept, ExpenseStatus::Pending);
        assert!(ApprovalStateMachine::authorize_update(&own_pending, &staff, &changes).is_ok());

        let others_pending = expense(other.user_id, dept, ExpenseStatus::Pending);
        assert_eq!(
            ApprovalStateMachine::authorize_update(&others_pending, &staff, &changes),
            Err(ExpenseError::NotOwner)
        );

        let own_approved = expense(staff.user_id, dept, ExpenseStatus::Approved);
        assert_eq!(
            ApprovalStateMachine::authorize_update(&own_approved, &staff, &changes),
            Err(ExpenseError::NotPending(ExpenseStatus::Approved))
        );
    }

    #[test]
    fn test_hod_and_admin_update_any() {
        let dept = DepartmentId::new();
        let changes = ExpenseChanges {
            vendor: Some("New Vendor".into()),
            ..Default::default()
        };
        let approved = expense(UserId::new(), dept, ExpenseStatus::Approved);

        for role in [Role::Hod, Role::Admin] {
            assert!(
                ApprovalStateMachine::authorize_update(&approved, &actor(role, dept), &changes)
                    .is_ok()
            );
        }
    }

    #[test]
    fn test_delete_rules() {
        let dept = DepartmentId::new();
        let staff = actor(Role::Staff, dept);
        let hod = actor(Role::Hod, dept);
        let admin = actor(Role::Admin, dept);

        let own_pending = expense(staff.user_id, dept, ExpenseStatus::Pending);
        let own_approved = expense(staff.user_id, dept, ExpenseStatus::Approved);

        assert!(ApprovalStateMachine::authorize_delete(&own_pending, &staff).is_ok());
        assert!(ApprovalStateMachine::authorize_delete(&own_approved, &staff).is_err());
        assert!(ApprovalStateMachine::authorize_delete(&own_approved, &admin).is_ok());
        assert!(matches!(
            ApprovalStateMachine::authorize_delete(&own_pending, &hod),
            Err(ExpenseError::Access(_))
        ));
    }

    #[test]
    fn test_other_department_is_not_found() {
        let admin = actor(Role::Admin, DepartmentId::new());
        let e = expense(UserId::new(), DepartmentId::new(), ExpenseStatus::Pending);

        assert_eq!(
            ApprovalStateMachine::approve(&e, &admin, None),
            Err(ExpenseError::NotFound(e.id))
        );
        assert_eq!(
            ApprovalStateMachine::authorize_delete(&e, &admin),
            Err(ExpenseError::NotFound(e.id))
        );
    }

    #[test]
    fn test_receipt_delete_rules() {
        let dept = DepartmentId::new();
        let staff = actor(Role::Staff, dept);
        let hod = actor(Role::Hod, dept);
        let admin = actor(Role::Admin, dept);

        let pending = expense(staff.user_id, dept, ExpenseStatus::Pending);
        let approved = expense(staff.user_id, dept, ExpenseStatus::Approved);

        assert!(ApprovalStateMachine::authorize_receipt_delete(&pending, &staff).is_ok());
        assert!(ApprovalStateMachine::authorize_receipt_delete(&pending, &hod).is_ok());
        assert!(ApprovalStateMachine::authorize_receipt_delete(&approved, &staff).is_err());
        assert!(ApprovalStateMachine::authorize_receipt_delete(&approved, &hod).is_err());
        assert!(ApprovalStateMachine::authorize_receipt_delete(&approved, &admin).is_ok());

        let other_staff = actor(Role::Staff, dept);
        assert_eq!(
            ApprovalStateMachine::authorize_receipt_delete(&pending, &other_staff),
            Err(ExpenseError::NotOwner)
        );
    }

    #[test]
    fn test_valid_transitions() {
        use ExpenseStatus::{Approved, Pending, Rejected};
        assert!(ApprovalStateMachine::is_valid_transition(Pending, Approved));
        assert!(ApprovalStateMachine::is_valid_transition(Pending, Rejected));
        assert!(!ApprovalStateMachine::is_valid_transition(Approved, Rejected));
        assert!(!ApprovalStateMachine::is_valid_transition(Rejected, Pending));
        assert!(!ApprovalStateMachine::is_valid_transition(Approved, Pending));
    }
}
