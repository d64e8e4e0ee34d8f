//! Append-only audit trail fed by domain events.

pub mod event;
pub mod trail;

pub use event::{AuditAction, AuditEvent, AuditQuery, ClientInfo};
pub use trail::{AuditSink, AuditTrail};
