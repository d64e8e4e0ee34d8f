//! Role-based access policy.
//!
//! A static role → capability table consulted by every mutating operation.
//! Unknown roles resolve to no capabilities.

pub mod actor;
pub mod policy;

pub use actor::Actor;
pub use policy::{AccessError, AccessPolicy, Permission, Role};
