//! Command Handlers module
//!
//! Engines that orchestrate ledger operations: validation, FX, one unit of
//! work per mutation, and the transaction log append.

mod billing_handler;
mod commands;
mod ledger;
mod statement_handler;
mod topup_handler;
mod transfer_handler;


pub use billing_handler::FeatureBillingEngine;
pub use commands::*;
pub use ledger::{Ledger, IBAN_MAX_ATTEMPTS};
pub use statement_handler::TransactionLog;
pub use topup_handler::TopUpProcessor;
pub use transfer_handler::{TransferEngine, TransferKind};

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{Account, Amount, AmountError, DomainError, OperationContext};
use crate::error::{AppError, AppResult};

/// The acting user, or `Unauthorized`
pub(crate) fn require_actor(context: &OperationContext) -> AppResult<Uuid> {
    context
        .actor()
        .ok_or_else(|| AppError::Unauthorized("X-Request-User-Id header is required".to_string()))
}

/// Owner or ROLE_ADMIN
pub(crate) fn ensure_access(context: &OperationContext, account: &Account) -> Result<(), DomainError> {
    match context.actor() {
        Some(actor) if account.is_owned_by(actor) => Ok(()),
        _ if context.is_admin() => Ok(()),
        _ => Err(DomainError::forbidden("account belongs to another user")),
    }
}

/// Amount produced by an FX conversion
pub(crate) fn converted_amount(converted: Decimal) -> Result<Amount, DomainError> {
    Amount::new(converted).map_err(|e| match e {
        AmountError::Overflow => {
            DomainError::InvalidAmount(format!("converted amount {} exceeds maximum", converted))
        }
        _ => DomainError::InvalidAmount(format!("converted amount {} is too small", converted)),
    })
}
