//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use rust_decimal::Decimal;
use thiserror::Error;

use super::context::Privilege;

/// Business rule violations raised by the ledger engines.
///
/// Upstream (FX, gateway) and storage failures live in their own enums and are
/// aggregated next to this one in `AppError`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Actor neither owns the resource nor holds ROLE_ADMIN
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Invalid amount (zero, negative after rounding, or below a minimum)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Cannot transfer to the same account")]
    SameAccount,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    #[error("Privilege already granted: {0}")]
    AlreadyGranted(Privilege),

    /// A concurrent grant of the same privilege won the race
    #[error("Role conflict: {0}")]
    RoleConflict(String),

    #[error("Account balance must be zero before deletion (balance {balance})")]
    NonZeroBalance { balance: Decimal },

    #[error("Account limit reached: upgrade to open more accounts")]
    AccountLimitReached,

    #[error("Account identifier already in use: {0}")]
    IdentifierCollision(String),

    #[error("Could not generate a unique account identifier after {attempts} attempts")]
    GenerationExhausted { attempts: u32 },

    #[error("Payment not completed (status: {status})")]
    PaymentIncomplete { status: String },

    #[error("Payment session carries no amount")]
    MissingAmount,

    #[error("Invalid payment session metadata: {0}")]
    InvalidSessionMetadata(String),
}

impl DomainError {
    pub fn account_not_found(id: impl ToString) -> Self {
        Self::AccountNotFound(id.to_string())
    }

    pub fn insufficient_funds(required: Decimal, available: Decimal) -> Self {
        Self::InsufficientFunds { required, available }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::AccountNotFound(_) => "account_not_found",
            Self::Forbidden(_) => "forbidden",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::SameAccount => "same_account",
            Self::InvalidOperation(_) => "invalid_operation",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::AlreadyGranted(_) => "already_granted",
            Self::RoleConflict(_) => "role_conflict",
            Self::NonZeroBalance { .. } => "non_zero_balance",
            Self::AccountLimitReached => "account_limit_reached",
            Self::IdentifierCollision(_) => "identifier_collision",
            Self::GenerationExhausted { .. } => "generation_exhausted",
            Self::PaymentIncomplete { .. } => "payment_incomplete",
            Self::MissingAmount => "missing_amount",
            Self::InvalidSessionMetadata(_) => "invalid_session_metadata",
        }
    }

    /// Check if this is a client error (user's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount(_)
                | Self::SameAccount
                | Self::InvalidOperation(_)
                | Self::InsufficientFunds { .. }
                | Self::NonZeroBalance { .. }
                | Self::PaymentIncomplete { .. }
                | Self::AccountLimitReached
        )
    }

    /// Check if this is a conflict error
    pub fn is_conflict_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyGranted(_)
                | Self::RoleConflict(_)
                | Self::IdentifierCollision(_)
                | Self::GenerationExhausted { .. }
        )
    }

    /// Errors caused by data handed over by the payment gateway
    pub fn is_upstream_error(&self) -> bool {
        matches!(self, Self::MissingAmount | Self::InvalidSessionMetadata(_))
    }
}
