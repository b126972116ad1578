//! Billing Handler
//!
//! Sells the SUPER_USER upgrade: a fixed-price debit and the privilege grant
//! commit together or not at all.

use std::sync::Arc;

use crate::config::LedgerSettings;
use crate::domain::{
    round_rate, Amount, AmountError, Currency, DomainError, NewTransaction, OperationContext, Privilege,
    TransactionType,
};
use crate::error::{AppError, AppResult};
use crate::fx::FxConverter;
use crate::store::LedgerStore;

use super::{require_actor, Ledger, PurchaseFeatureCommand, PurchaseResult};

#[derive(Clone)]
pub struct FeatureBillingEngine {
    store: Arc<dyn LedgerStore>,
    ledger: Ledger,
    fx: FxConverter,
    price: Amount,
    price_currency: Currency,
}

impl FeatureBillingEngine {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        ledger: Ledger,
        fx: FxConverter,
        settings: &LedgerSettings,
    ) -> AppResult<Self> {
        let price = Amount::new(settings.feature_price)
            .map_err(|e| AppError::Internal(format!("invalid feature price: {}", e)))?;

        Ok(Self {
            store,
            ledger,
            fx,
            price,
            price_currency: settings.feature_price_currency,
        })
    }

    pub async fn purchase_super_user(
        &self,
        context: &OperationContext,
        command: PurchaseFeatureCommand,
    ) -> AppResult<PurchaseResult> {
        let privilege = Privilege::SuperUser;
        let buyer = require_actor(context)?;

        if self.store.has_privilege(buyer, privilege).await? {
            return Err(DomainError::AlreadyGranted(privilege).into());
        }

        let account = self.ledger.get_account(command.account_id).await?;
        if !account.is_owned_by(buyer) {
            return Err(DomainError::forbidden("account belongs to another user").into());
        }

        let converted = self
            .fx
            .convert(self.price.value(), self.price_currency, account.currency)
            .await?;
        let debit = Amount::new(converted).map_err(|e| match e {
            AmountError::Overflow => DomainError::InvalidAmount(format!("converted price {} exceeds maximum", converted)),
            _ => DomainError::InvalidAmount(format!("converted price {} is not payable", converted)),
        })?;
        let fx_rate = round_rate(debit.value() / self.price.value());

        if !account.balance.is_sufficient_for(&debit) {
            return Err(DomainError::insufficient_funds(debit.value(), account.balance.value()).into());
        }

        let mut uow = self.store.begin().await?;

        self.ledger.adjust_balance(uow.as_mut(), account.id, -debit.value()).await?;

        uow.grant_privilege(buyer, privilege).await.map_err(|e| -> AppError {
            if e.is_unique_violation() {
                DomainError::RoleConflict(format!("{} was granted concurrently", privilege)).into()
            } else {
                e.into()
            }
        })?;

        let record = uow
            .append_transaction(NewTransaction {
                initiator_id: buyer,
                from_account_id: Some(account.id),
                to_account_id: None,
                kind: TransactionType::PurchaseFeature,
                amount_from: Some(debit.value()),
                currency_from: Some(account.currency),
                amount_to: None,
                currency_to: None,
                fx_rate,
                external_ref: None,
                description: format!("Purchase {} ({} {})", privilege, self.price, self.price_currency),
            })
            .await?;

        uow.commit().await?;

        tracing::info!(
            transaction_id = record.id,
            user_id = %buyer,
            account_id = %account.id,
            debited = %debit,
            currency = %account.currency,
            "Privilege {} purchased",
            privilege
        );

        Ok(PurchaseResult {
            transaction_id: record.id,
            privilege,
            account_id: account.id,
            debited_amount: debit.value(),
            debited_currency: account.currency,
            fx_rate,
        })
    }
}
