//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DomainError;
use crate::fx::FxError;
use crate::gateway::GatewayError;
use crate::store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// No acting user on a request that needs one
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Fx(#[from] FxError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Coarse category an error maps to at the transport boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    BadRequest,
    Conflict,
    Upstream,
    Unauthorized,
    Internal,
}

impl ErrorKind {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Unauthorized(_) => ErrorKind::Unauthorized,
            AppError::InvalidRequest(_) => ErrorKind::BadRequest,
            AppError::Domain(err) => match err {
                DomainError::AccountNotFound(_) => ErrorKind::NotFound,
                DomainError::Forbidden(_) => ErrorKind::Forbidden,
                e if e.is_client_error() => ErrorKind::BadRequest,
                e if e.is_conflict_error() => ErrorKind::Conflict,
                e if e.is_upstream_error() => ErrorKind::Upstream,
                _ => ErrorKind::Internal,
            },
            AppError::Fx(_) => ErrorKind::Upstream,
            AppError::Gateway(GatewayError::SessionNotFound(_)) => ErrorKind::NotFound,
            AppError::Gateway(GatewayError::Unavailable(_)) => ErrorKind::Upstream,
            AppError::Store(StoreError::VersionConflict { .. }) => ErrorKind::Conflict,
            AppError::Store(_) | AppError::Internal(_) | AppError::Config(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "unauthorized",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::Domain(e) => e.code(),
            AppError::Fx(e) => e.code(),
            AppError::Gateway(e) => e.code(),
            AppError::Store(StoreError::VersionConflict { .. }) => "version_conflict",
            AppError::Store(_) => "database_error",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
        }
    }

    /// Upstream failures and version conflicts may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Store(e) => e.is_retryable(),
            other => other.kind() == ErrorKind::Upstream,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();

        let details = match &self {
            AppError::Domain(DomainError::InsufficientFunds { required, available }) => {
                Some(format!("required {}, available {}", required, available))
            }
            AppError::Domain(DomainError::AccountNotFound(id)) => Some(id.clone()),
            AppError::Store(e) if kind == ErrorKind::Internal => {
                tracing::error!("Store error: {:?}", e);
                None
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                None
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                None
            }
            _ => None,
        };

        // Internal failures never leak their message
        let error = if kind == ErrorKind::Internal {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error,
            error_code: self.code().to_string(),
            details,
        };

        (kind.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Privilege;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    #[test]
    fn test_status_categories() {
        let cases: Vec<(AppError, StatusCode)> = vec![
            (DomainError::account_not_found(Uuid::nil()).into(), StatusCode::NOT_FOUND),
            (DomainError::forbidden("not yours").into(), StatusCode::FORBIDDEN),
            (DomainError::SameAccount.into(), StatusCode::BAD_REQUEST),
            (DomainError::AccountLimitReached.into(), StatusCode::BAD_REQUEST),
            (DomainError::NonZeroBalance { balance: Decimal::ONE }.into(), StatusCode::BAD_REQUEST),
            (
                DomainError::PaymentIncomplete { status: "unpaid".into() }.into(),
                StatusCode::BAD_REQUEST,
            ),
            (DomainError::AlreadyGranted(Privilege::SuperUser).into(), StatusCode::CONFLICT),
            (DomainError::GenerationExhausted { attempts: 5 }.into(), StatusCode::CONFLICT),
            (DomainError::MissingAmount.into(), StatusCode::BAD_GATEWAY),
            (DomainError::InvalidSessionMetadata("x".into()).into(), StatusCode::BAD_GATEWAY),
            (FxError::Unavailable("down".into()).into(), StatusCode::BAD_GATEWAY),
            (FxError::rate_not_found("EUR", "XXX").into(), StatusCode::BAD_GATEWAY),
            (GatewayError::Unavailable("down".into()).into(), StatusCode::BAD_GATEWAY),
            (GatewayError::SessionNotFound("cs".into()).into(), StatusCode::NOT_FOUND),
            (
                StoreError::VersionConflict { account_id: Uuid::nil(), expected: 1 }.into(),
                StatusCode::CONFLICT,
            ),
            (StoreError::Poisoned.into(), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::Unauthorized("missing".into()), StatusCode::UNAUTHORIZED),
        ];

        for (err, status) in cases {
            assert_eq!(err.kind().status(), status, "{:?}", err);
        }
    }

    #[test]
    fn test_retryable() {
        assert!(AppError::from(FxError::Unavailable("x".into())).is_retryable());
        assert!(AppError::from(GatewayError::Unavailable("x".into())).is_retryable());
        assert!(AppError::from(StoreError::VersionConflict { account_id: Uuid::nil(), expected: 0 }).is_retryable());
        assert!(!AppError::from(DomainError::SameAccount).is_retryable());
        assert!(!AppError::from(StoreError::Closed).is_retryable());
    }

    #[test]
    fn test_codes() {
        assert_eq!(AppError::from(DomainError::SameAccount).code(), "same_account");
        assert_eq!(AppError::from(FxError::Unavailable("x".into())).code(), "fx_unavailable");
        assert_eq!(AppError::InvalidRequest("bad".into()).code(), "invalid_request");
    }
}
