//! API route definitions.

use axum::{Router, middleware};

use deptledger_core::access::Actor;
use deptledger_core::audit::{AuditAction, ClientInfo};
use deptledger_shared::AppError;

use crate::error::{ApiError, ApiResult};
use crate::{AppState, middleware::auth::auth_middleware};

pub mod audit_logs;
pub mod budget_expenses;
pub mod budgets;
pub mod categories;
pub mod expenses;
pub mod fiscal_years;
pub mod flex_budgets;
pub mod health;
pub mod receipts;

/// Largest page a list endpoint serves.
pub(crate) const MAX_PER_PAGE: u32 = 100;

/// Creates the API router. Everything except `/health` sits behind the
/// authentication middleware.
#[allow(clippy::needless_pass_by_value)]
pub fn api_routes_with_state(state: AppState) -> Router<AppState> {
    // Protected routes that require authentication
    let protected_routes = Router::new()
        .merge(categories::routes())
        .merge(budgets::routes())
        .merge(expenses::routes())
        .merge(receipts::routes())
        .merge(flex_budgets::routes())
        .merge(budget_expenses::routes())
        .merge(fiscal_years::routes())
        .merge(audit_logs::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(health::routes())
        .merge(protected_routes)
}

/// Converts an operation result for the response, recording refusals in the
/// audit trail as `auth.denied` for the attempted action.
pub(crate) fn tracked<T, E>(
    state: &AppState,
    actor: &Actor,
    client: &ClientInfo,
    attempted: AuditAction,
    result: Result<T, E>,
) -> ApiResult<T>
where
    E: Into<AppError>,
{
    result.map_err(|e| {
        let err = e.into();
        state.record_denial(actor, client, attempted, &err);
        ApiError(err)
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode, header::AUTHORIZATION},
    };
    use http_body_util::BodyExt;
    use sea_orm::DatabaseConnection;
    use tower::ServiceExt;
    use uuid::Uuid;

    use deptledger_core::audit::{AuditEvent, AuditSink, AuditTrail};
    use deptledger_shared::{JwtConfig, JwtService, LedgerConfig};

    use super::*;
    use crate::create_router;

    #[derive(Clone, Default)]
    struct CollectingSink {
        events: Arc<Mutex<Vec<AuditEvent>>>,
    }

    #[async_trait]
    impl AuditSink for CollectingSink {
        async fn append(&self, event: &AuditEvent) -> Result<(), AppError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    /// State with no database behind it; every test here must be answered
    /// before a query is issued.
    fn test_state() -> (AppState, CollectingSink, tokio::task::JoinHandle<()>) {
        let sink = CollectingSink::default();
        let (audit, handle) = AuditTrail::spawn(sink.clone());
        let state = AppState {
            db: Arc::new(DatabaseConnection::Disconnected),
            jwt_service: Arc::new(JwtService::new(JwtConfig::default())),
            audit,
            ledger: Arc::new(LedgerConfig::default()),
        };
        (state, sink, handle)
    }

    fn token(state: &AppState, role: &str) -> String {
        state
            .jwt_service
            .generate_access_token(Uuid::new_v4(), Uuid::new_v4(), role)
            .expect("should generate token")
    }

    async fn send(state: AppState, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = create_router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    /// Drops every trail handle and waits for the listener to drain.
    async fn drained(
        sink: CollectingSink,
        handle: tokio::task::JoinHandle<()>,
    ) -> Vec<AuditEvent> {
        handle.await.unwrap();
        sink.events.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let (state, _sink, _handle) = test_state();
        let (status, body) = send(
            state,
            Request::get("/api/v1/health").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized_and_audited() {
        let (state, sink, handle) = test_state();
        let (status, body) = send(
            state,
            Request::get("/api/v1/expenses").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "UNAUTHORIZED");

        let events = drained(sink, handle).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, AuditAction::AuthDenied);
        assert_eq!(events[0].actor_id, None);
    }

    #[tokio::test]
    async fn test_bad_token_is_unauthorized() {
        let (state, _sink, _handle) = test_state();
        let (status, body) = send(
            state,
            Request::get("/api/v1/budgets")
                .header(AUTHORIZATION, "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_unknown_role_is_unauthorized() {
        let (state, _sink, _handle) = test_state();
        let bearer = format!("Bearer {}", token(&state, "auditor"));
        let (status, _) = send(
            state,
            Request::get("/api/v1/categories")
                .header(AUTHORIZATION, bearer)
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_staff_cannot_allot() {
        let (state, sink, handle) = test_state();
        let bearer = format!("Bearer {}", token(&state, "staff"));
        let payload = serde_json::json!({
            "category_id": Uuid::new_v4(),
            "fiscal_year": "2024-25",
            "allotted_amount": "500000",
        });

        let (status, body) = send(
            state,
            Request::post("/api/v1/budgets/allotments")
                .header(AUTHORIZATION, bearer)
                .header("content-type", "application/json")
                .header("x-forwarded-for", "203.0.113.7")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "FORBIDDEN");

        let events = drained(sink, handle).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, AuditAction::AuthDenied);
        assert!(events[0].actor_id.is_some());
        assert_eq!(
            events[0].new_values.as_ref().unwrap()["attempted"],
            "budget_allotment.upsert"
        );
        assert_eq!(events[0].client.ip_address.as_deref(), Some("203.0.113.7"));
    }

    #[tokio::test]
    async fn test_staff_cannot_delete_flex_budget() {
        let (state, _sink, _handle) = test_state();
        let bearer = format!("Bearer {}", token(&state, "staff"));
        let (status, _) = send(
            state,
            Request::delete(format!("/api/v1/flex-budgets/{}", Uuid::new_v4()))
                .header(AUTHORIZATION, bearer)
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_invalid_listing_filter_is_rejected() {
        let (state, _sink, _handle) = test_state();
        let bearer = format!("Bearer {}", token(&state, "hod"));
        let (status, body) = send(
            state,
            Request::get("/api/v1/expenses?status=archived")
                .header(AUTHORIZATION, bearer)
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "VALIDATION_ERROR");
    }
}
