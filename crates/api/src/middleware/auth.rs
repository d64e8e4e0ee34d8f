//! Authentication middleware for protected routes.
//!
//! Resolves the bearer token into an [`Actor`] stored in the request
//! extensions. Handlers take the actor through the [`AuthUser`] extractor and
//! never see the token itself.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use deptledger_core::access::{Actor, Role};
use deptledger_core::audit::{AuditAction, AuditEvent};
use deptledger_shared::types::{DepartmentId, UserId};
use deptledger_shared::{AppError, Claims, JwtError};

use super::client::client_info;
use crate::AppState;
use crate::error::ApiError;

/// Extracts the bearer token from the Authorization header.
fn extract_bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
}

/// Builds the actor a token speaks for. An unknown role is refused.
fn actor_from_claims(claims: &Claims) -> Result<Actor, AppError> {
    let role = Role::parse(&claims.role)
        .ok_or_else(|| AppError::Unauthorized(format!("unknown role '{}'", claims.role)))?;
    Ok(Actor::new(
        UserId::from_uuid(claims.user_id()),
        DepartmentId::from_uuid(claims.department_id()),
        role,
    ))
}

/// Authentication middleware that validates JWT tokens.
///
/// This middleware:
/// 1. Extracts the Bearer token from the Authorization header
/// 2. Validates the token and resolves the acting user
/// 3. Stores the actor in request extensions for handlers to access
///
/// Failures answer 401 and emit an `auth.denied` audit event.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let resolved = match auth_header.and_then(extract_bearer_token) {
        None => Err(AppError::Unauthorized(
            "Authorization header with Bearer token is required".to_string(),
        )),
        Some(token) => match state.jwt_service.validate_token(token) {
            Ok(claims) => actor_from_claims(&claims),
            Err(JwtError::Expired) => Err(AppError::Unauthorized("Token has expired".to_string())),
            Err(_) => Err(AppError::Unauthorized(
                "Invalid or malformed token".to_string(),
            )),
        },
    };

    match resolved {
        Ok(actor) => {
            request.extensions_mut().insert(actor);
            next.run(request).await
        }
        Err(err) => {
            let client = client_info(request.headers(), request.extensions());
            tracing::warn!(
                path = %request.uri().path(),
                error = %err,
                "Rejected unauthenticated request"
            );
            state.record(
                AuditEvent::new(AuditAction::AuthDenied, None)
                    .new_values(json!({
                        "method": request.method().as_str(),
                        "path": request.uri().path(),
                        "reason": err.to_string(),
                    }))
                    .client(client),
            );
            ApiError(err).into_response()
        }
    }
}

/// Extractor for the authenticated actor.
///
/// ```ignore
/// async fn handler(AuthUser(actor): AuthUser) -> impl IntoResponse {
///     actor.require(Permission::Read)?;
///     // ...
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Actor);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Actor>()
            .copied()
            .map(AuthUser)
            .ok_or_else(|| ApiError(AppError::Unauthorized("Authentication required".to_string())))
    }
}
