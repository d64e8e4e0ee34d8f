//! Application-wide error types.

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
///
/// Every domain error converts into one of these variants so that the
/// HTTP layer can map failures to a stable status and error code.
#[derive(Debug, Error)]
pub enum AppError {
    /// No valid actor for the request.
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Authenticated but lacking a capability or ownership.
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Referenced entity is absent or outside the caller's department.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed or missing input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// State-machine precondition violated.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Availability check rejected the amount.
    #[error("Insufficient budget: remaining {remaining}, requested {requested}")]
    InsufficientBudget {
        /// Remaining spendable balance at the time of the check.
        remaining: Decimal,
        /// Amount the caller asked to spend.
        requested: Decimal,
    },

    /// Persistence failure.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Validation(_) | Self::InsufficientBudget { .. } => 400,
            Self::InvalidState(_) => 409,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::InsufficientBudget { .. } => "INSUFFICIENT_BUDGET",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true for failures whose detail must stay server-side.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Internal(_))
    }

    /// Message safe to show to the caller.
    #[must_use]
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        }
    }
}
