//! Request middleware and extractors.

pub mod auth;
pub mod client;

pub use auth::{AuthUser, auth_middleware};
pub use client::Client;
