//! Command definitions
//!
//! Commands represent intentions to change the system state; results are
//! what the engines hand back once the change is committed.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Currency, Privilege, TopUpLog};

/// Command to open an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountCommand {
    pub currency: Currency,
}

/// Command to move money between two accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferCommand {
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    /// Amount to transfer (as string for precise decimal)
    pub amount: String,
    /// Optional memo
    #[serde(default)]
    pub memo: Option<String>,
}

impl TransferCommand {
    pub fn new(from_account_id: Uuid, to_account_id: Uuid, amount: impl Into<String>) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount: amount.into(),
            memo: None,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }
}

/// Command to start a hosted checkout for a top-up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopUpCommand {
    pub account_id: Uuid,
    /// Amount in minor units (cents)
    pub amount: i64,
    /// Currency charged by the gateway
    pub currency: Currency,
    pub success_url: String,
    pub cancel_url: String,
}

/// Command to buy the SUPER_USER upgrade from one of the actor's accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseFeatureCommand {
    pub account_id: Uuid,
}

/// Result of a successful transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResult {
    pub transaction_id: i64,
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub debited_amount: Decimal,
    pub debited_currency: Currency,
    pub credited_amount: Decimal,
    pub credited_currency: Currency,
    pub fx_rate: Decimal,
}

/// Hosted checkout created for a top-up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResult {
    pub session_id: String,
    pub checkout_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopUpOutcome {
    Credited,
    AlreadyProcessed,
}

/// Result of verifying a payment session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopUpResult {
    pub outcome: TopUpOutcome,
    pub session_id: String,
    pub account_id: Uuid,
    pub paid: Decimal,
    pub paid_currency: Currency,
    pub credited: Decimal,
    pub credited_currency: Currency,
}

impl TopUpResult {
    pub fn from_log(log: &TopUpLog, outcome: TopUpOutcome) -> Self {
        Self {
            outcome,
            session_id: log.session_id.clone(),
            account_id: log.account_id,
            paid: log.amount_paid,
            paid_currency: log.paid_currency,
            credited: log.amount_credited,
            credited_currency: log.credited_currency,
        }
    }

    pub fn was_credited(&self) -> bool {
        self.outcome == TopUpOutcome::Credited
    }
}

/// Result of a feature purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseResult {
    pub transaction_id: i64,
    pub privilege: Privilege,
    pub account_id: Uuid,
    pub debited_amount: Decimal,
    pub debited_currency: Currency,
    pub fx_rate: Decimal,
}
