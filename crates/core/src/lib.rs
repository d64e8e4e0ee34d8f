//! Core business logic for Deptledger.
//!
//! This crate contains pure business logic with no web or SQL dependencies.
//! All domain types, validation rules, and calculations live here.
//!
//! # Modules
//!
//! - `fiscal` - April–March fiscal calendar
//! - `access` - Role capabilities and the acting user
//! - `budget` - Plans, allotments, reconciliation and availability checks
//! - `expense` - Approval state machine and listing predicates
//! - `audit` - Audit events and the listener that persists them

pub mod access;
pub mod audit;
pub mod budget;
pub mod expense;
pub mod fiscal;
