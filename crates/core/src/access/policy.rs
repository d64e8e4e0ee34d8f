//! Role and permission definitions.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use deptledger_shared::AppError;

/// User role within a department.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access including user management and deletion.
    Admin,
    /// Head of department: approves expenses and manages budgets.
    Hod,
    /// Submits expenses and views reports.
    Staff,
}

impl Role {
    /// Returns the string representation of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Hod => "hod",
            Self::Staff => "staff",
        }
    }

    /// Parses a role from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "hod" => Some(Self::Hod),
            "staff" => Some(Self::Staff),
            _ => None,
        }
    }

    /// Capabilities granted to this role.
    #[must_use]
    pub const fn permissions(&self) -> &'static [Permission] {
        use Permission::{
            Approve, Create, Delete, DownloadReports, ManageBudgets, ManageUsers, Read, Update,
            ViewReports,
        };

        match self {
            Self::Admin => &[
                Create,
                Read,
                Update,
                Delete,
                Approve,
                ManageUsers,
                ManageBudgets,
                ViewReports,
                DownloadReports,
            ],
            Self::Hod => &[
                Create,
                Read,
                Update,
                Approve,
                ManageBudgets,
                ViewReports,
                DownloadReports,
            ],
            Self::Staff => &[Create, Read, ViewReports],
        }
    }

    /// Returns true if this role holds `permission`.
    #[must_use]
    pub fn can(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A capability checked before an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Create expenses and other records.
    Create,
    /// Read department records.
    Read,
    /// Edit records regardless of ownership.
    Update,
    /// Delete records regardless of ownership.
    Delete,
    /// Approve or reject pending expenses.
    Approve,
    /// Manage users.
    ManageUsers,
    /// Plan and allot budgets, manage categories.
    ManageBudgets,
    /// View reconciliation and audit reports.
    ViewReports,
    /// Export reports.
    DownloadReports,
}

impl Permission {
    /// Returns the string representation of the permission.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Approve => "approve",
            Self::ManageUsers => "manage_users",
            Self::ManageBudgets => "manage_budgets",
            Self::ViewReports => "view_reports",
            Self::DownloadReports => "download_reports",
        }
    }

    /// Parses a permission from its string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Self::Create),
            "read" => Some(Self::Read),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            "approve" => Some(Self::Approve),
            "manage_users" => Some(Self::ManageUsers),
            "manage_budgets" => Some(Self::ManageBudgets),
            "view_reports" => Some(Self::ViewReports),
            "download_reports" => Some(Self::DownloadReports),
            _ => None,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access-control errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    /// Role lacks the capability.
    #[error("Role '{role}' lacks the '{permission}' permission")]
    MissingPermission {
        /// Role of the actor.
        role: Role,
        /// Capability that was required.
        permission: Permission,
    },

    /// Actor is neither the owner nor privileged for this record.
    #[error("{0}")]
    NotOwner(String),
}

impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        Self::Forbidden(err.to_string())
    }
}

/// Static access policy.
pub struct AccessPolicy;

impl AccessPolicy {
    /// Returns true if the named role may perform the named action.
    ///
    /// Unknown roles or actions fail closed.
    #[must_use]
    pub fn can_perform(role: &str, action: &str) -> bool {
        match (Role::parse(role), Permission::parse(action)) {
            (Some(role), Some(permission)) => role.can(permission),
            _ => false,
        }
    }

    /// Requires that `role` holds `permission`.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::MissingPermission` otherwise.
    pub fn require(role: Role, permission: Permission) -> Result<(), AccessError> {
        if role.can(permission) {
            Ok(())
        } else {
            Err(AccessError::MissingPermission { role, permission })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("admin", "create", true)]
    #[case("admin", "delete", true)]
    #[case("admin", "manage_users", true)]
    #[case("admin", "download_reports", true)]
    #[case("hod", "approve", true)]
    #[case("hod", "manage_budgets", true)]
    #[case("hod", "update", true)]
    #[case("hod", "delete", false)]
    #[case("hod", "manage_users", false)]
    #[case("staff", "create", true)]
    #[case("staff", "read", true)]
    #[case("staff", "view_reports", true)]
    #[case("staff", "update", false)]
    #[case("staff", "approve", false)]
    #[case("staff", "manage_budgets", false)]
    #[case("staff", "download_reports", false)]
    #[case("superuser", "read", false)]
    #[case("", "read", false)]
    #[case("admin", "launch_rockets", false)]
    fn test_can_perform(#[case] role: &str, #[case] action: &str, #[case] expected: bool) {
        assert_eq!(AccessPolicy::can_perform(role, action), expected);
    }

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!(Role::parse("HOD"), Some(Role::Hod));
        assert_eq!(Role::parse("Admin"), Some(Role::Admin));
        assert_eq!(Role::parse("viewer"), None);
    }

    #[test]
    fn test_permission_counts() {
        assert_eq!(Role::Admin.permissions().len(), 9);
        assert_eq!(Role::Hod.permissions().len(), 7);
        assert_eq!(Role::Staff.permissions().len(), 3);
    }

    #[test]
    fn test_permission_strings_roundtrip() {
        for permission in Role::Admin.permissions() {
            assert_eq!(Permission::parse(permission.as_str()), Some(*permission));
        }
    }

    #[test]
    fn test_require_maps_to_forbidden() {
        let err = AccessPolicy::require(Role::Staff, Permission::Approve).unwrap_err();
        assert_eq!(
            err,
            AccessError::MissingPermission {
                role: Role::Staff,
                permission: Permission::Approve
            }
        );
        let app: AppError = err.into();
        assert_eq!(app.status_code(), 403);
        assert!(AccessPolicy::require(Role::Hod, Permission::Approve).is_ok());
    }
}
