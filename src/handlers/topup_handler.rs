//! Top-up Handler
//!
//! Creates gateway checkout sessions and credits paid sessions at most once.
//! The `top_up_logs` row keyed by session id is the gate: it is inserted
//! first in the unit of work, and losing that insert means another call
//! already credited (or is crediting) the session.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::LedgerSettings;
use crate::domain::{
    Amount, AmountError, Currency, DomainError, FxRate, NewTransaction, OperationContext, TopUpLog,
    TransactionType,
};
use crate::error::AppResult;
use crate::fx::{FxConverter, FxError};
use crate::gateway::{CheckoutSession, NewCheckoutSession, PaymentGateway};
use crate::store::LedgerStore;

use super::{
    converted_amount, require_actor, CheckoutResult, Ledger, TopUpCommand, TopUpOutcome, TopUpResult,
};

const METADATA_TYPE: &str = "type";
const METADATA_ACCOUNT_ID: &str = "accountId";
const METADATA_ACCOUNT_CURRENCY: &str = "accountCurrency";

#[derive(Clone)]
pub struct TopUpProcessor {
    store: Arc<dyn LedgerStore>,
    ledger: Ledger,
    fx: FxConverter,
    gateway: Arc<dyn PaymentGateway>,
    min_minor_units: i64,
}

impl TopUpProcessor {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        ledger: Ledger,
        fx: FxConverter,
        gateway: Arc<dyn PaymentGateway>,
        settings: &LedgerSettings,
    ) -> Self {
        Self {
            store,
            ledger,
            fx,
            gateway,
            min_minor_units: settings.topup_min_minor_units,
        }
    }

    /// Start a hosted checkout for one of the actor's accounts
    pub async fn create_checkout(&self, context: &OperationContext, command: TopUpCommand) -> AppResult<CheckoutResult> {
        let actor = require_actor(context)?;
        let account = self.ledger.get_account(command.account_id).await?;

        if !account.is_owned_by(actor) {
            return Err(DomainError::forbidden("account belongs to another user").into());
        }
        if command.amount < self.min_minor_units {
            return Err(DomainError::InvalidAmount(format!(
                "minimum top-up is {} minor units",
                self.min_minor_units
            ))
            .into());
        }

        let mut metadata = BTreeMap::new();
        metadata.insert(METADATA_TYPE.to_string(), "topup".to_string());
        metadata.insert(METADATA_ACCOUNT_ID.to_string(), account.id.to_string());
        metadata.insert(METADATA_ACCOUNT_CURRENCY.to_string(), account.currency.code().to_string());

        let session = self
            .gateway
            .create_session(NewCheckoutSession {
                amount_minor_units: command.amount,
                currency: command.currency,
                product_name: format!("Top-up account {}", account.iban),
                success_url: command.success_url,
                cancel_url: command.cancel_url,
                metadata,
            })
            .await?;

        tracing::info!(
            session_id = %session.id,
            account_id = %account.id,
            amount_minor_units = command.amount,
            currency = %command.currency,
            "Checkout session created"
        );

        Ok(CheckoutResult {
            session_id: session.id,
            checkout_url: session.url,
        })
    }

    /// Reconcile a gateway session with a credit.
    ///
    /// Replays and concurrent duplicates return `AlreadyProcessed` without
    /// touching the balance.
    pub async fn verify(&self, session_id: &str) -> AppResult<TopUpResult> {
        let session = self.gateway.get_session(session_id).await?;

        if !session.is_paid() {
            return Err(DomainError::PaymentIncomplete {
                status: session.payment_status.clone(),
            }
            .into());
        }

        if let Some(existing) = self.store.find_top_up(session_id).await? {
            tracing::info!(session_id, "Top-up already processed");
            return Ok(TopUpResult::from_log(&existing, TopUpOutcome::AlreadyProcessed));
        }

        let (account_id, metadata_currency) = read_metadata(&session)?;

        let minor = session.amount_minor_units().ok_or(DomainError::MissingAmount)?;
        let paid = Amount::from_minor_units(minor).map_err(|e| match e {
            AmountError::Overflow => DomainError::InvalidSessionMetadata(format!("amount {} exceeds maximum", minor)),
            _ => DomainError::InvalidSessionMetadata(format!("non-positive amount {}", minor)),
        })?;

        let raw_currency = session
            .currency
            .as_deref()
            .ok_or_else(|| DomainError::InvalidSessionMetadata("session has no currency".to_string()))?;

        let account = self.ledger.get_account(account_id).await?;

        let paid_currency: Currency = raw_currency
            .parse()
            .map_err(|_| FxError::rate_not_found(raw_currency.to_ascii_uppercase(), account.currency.code()))?;

        if metadata_currency != account.currency {
            tracing::warn!(
                session_id,
                account_id = %account.id,
                metadata_currency = %metadata_currency,
                account_currency = %account.currency,
                "Session currency metadata differs from account, crediting in account currency"
            );
        }

        let converted = self.fx.convert(paid.value(), paid_currency, account.currency).await?;
        let credited = converted_amount(converted)?;
        let fx_rate = if paid_currency == account.currency {
            FxRate::identity()
        } else {
            FxRate::between(&paid, &credited)
        };

        let log = TopUpLog {
            session_id: session_id.to_string(),
            account_id: account.id,
            amount_paid: paid.value(),
            paid_currency,
            amount_credited: credited.value(),
            credited_currency: account.currency,
            processed_at: Utc::now(),
        };

        let mut uow = self.store.begin().await?;

        if !uow.insert_top_up(&log).await? {
            drop(uow);
            tracing::info!(session_id, "Concurrent top-up won the session, nothing credited");
            let existing = self.store.find_top_up(session_id).await?.unwrap_or(log);
            return Ok(TopUpResult::from_log(&existing, TopUpOutcome::AlreadyProcessed));
        }

        self.ledger.adjust_balance(uow.as_mut(), account.id, credited.value()).await?;

        let record = uow
            .append_transaction(NewTransaction {
                initiator_id: account.owner_id,
                from_account_id: None,
                to_account_id: Some(account.id),
                kind: TransactionType::Topup,
                amount_from: Some(paid.value()),
                currency_from: Some(paid_currency),
                amount_to: Some(credited.value()),
                currency_to: Some(account.currency),
                fx_rate: fx_rate.value(),
                external_ref: Some(session_id.to_string()),
                description: format!("Top-up {} {}", paid, paid_currency),
            })
            .await?;

        uow.commit().await?;

        tracing::info!(
            transaction_id = record.id,
            session_id,
            account_id = %account.id,
            paid = %paid,
            paid_currency = %paid_currency,
            credited = %credited,
            "Top-up credited"
        );

        Ok(TopUpResult::from_log(&log, TopUpOutcome::Credited))
    }
}

fn read_metadata(session: &CheckoutSession) -> Result<(Uuid, Currency), DomainError> {
    let field = |key: &str| {
        session
            .metadata
            .get(key)
            .ok_or_else(|| DomainError::InvalidSessionMetadata(format!("missing {}", key)))
    };

    let account_id = field(METADATA_ACCOUNT_ID)?
        .parse::<Uuid>()
        .map_err(|_| DomainError::InvalidSessionMetadata(format!("malformed {}", METADATA_ACCOUNT_ID)))?;
    let currency = field(METADATA_ACCOUNT_CURRENCY)?
        .parse::<Currency>()
        .map_err(|_| DomainError::InvalidSessionMetadata(format!("malformed {}", METADATA_ACCOUNT_CURRENCY)))?;

    Ok((account_id, currency))
}
