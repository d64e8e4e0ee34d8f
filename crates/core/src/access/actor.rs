//! The authenticated principal an operation runs on behalf of.

use serde::{Deserialize, Serialize};

use deptledger_shared::types::{DepartmentId, UserId};

use super::policy::{AccessError, AccessPolicy, Permission, Role};

/// Authenticated actor resolved from the request's credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// User ID.
    pub user_id: UserId,
    /// Department the actor is scoped to.
    pub department_id: DepartmentId,
    /// Role within the department.
    pub role: Role,
}

impl Actor {
    /// Creates a new actor.
    #[must_use]
    pub const fn new(user_id: UserId, department_id: DepartmentId, role: Role) -> Self {
        Self {
            user_id,
            department_id,
            role,
        }
    }

    /// Returns true if the actor's role holds `permission`.
    #[must_use]
    pub fn can(&self, permission: Permission) -> bool {
        self.role.can(permission)
    }

    /// Requires `permission`.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::MissingPermission` if the role lacks it.
    pub fn require(&self, permission: Permission) -> Result<(), AccessError> {
        AccessPolicy::require(self.role, permission)
    }

    /// Returns true if this actor is an administrator.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}
