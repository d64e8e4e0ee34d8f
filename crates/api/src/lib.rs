//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes under `/api/v1`
//! - JWT authentication middleware resolving the acting user
//! - Error to HTTP response mapping

pub mod error;
pub mod middleware;
pub mod routes;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use deptledger_core::access::Actor;
use deptledger_core::audit::{AuditAction, AuditEvent, AuditTrail, ClientInfo};
use deptledger_shared::{AppError, JwtService, LedgerConfig};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// JWT service for token operations.
    pub jwt_service: Arc<JwtService>,
    /// Audit event emitter.
    pub audit: AuditTrail,
    /// Ledger settings such as the reporting currency.
    pub ledger: Arc<LedgerConfig>,
}

impl AppState {
    /// A connection handle for a repository.
    #[must_use]
    pub fn conn(&self) -> DatabaseConnection {
        (*self.db).clone()
    }

    /// Emits an audit event.
    pub fn record(&self, event: AuditEvent) {
        self.audit.emit(event);
    }

    /// Records an `auth.denied` event when `err` is a refusal.
    pub fn record_denial(
        &self,
        actor: &Actor,
        client: &ClientInfo,
        attempted: AuditAction,
        err: &AppError,
    ) {
        if let AppError::Forbidden(reason) = err {
            tracing::warn!(
                user_id = %actor.user_id,
                role = %actor.role.as_str(),
                attempted = %attempted,
                %reason,
                "Access denied"
            );
            self.record(
                AuditEvent::new(AuditAction::AuthDenied, None)
                    .by(actor)
                    .new_values(serde_json::json!({
                        "attempted": attempted.as_str(),
                        "reason": reason,
                    }))
                    .client(client.clone()),
            );
        }
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
