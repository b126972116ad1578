//! Ledger
//!
//! Owns account records and every balance mutation. Other engines go through
//! [`Ledger::adjust_balance`] inside their own unit of work.

use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::LedgerSettings;
use crate::domain::{
    Account, Currency, DomainError, IbanGenerator, OperationContext, PublicAccount,
    RandomIbanGenerator,
};
use crate::error::{AppError, AppResult};
use crate::store::{LedgerStore, UnitOfWork};

use super::{ensure_access, require_actor};

/// Identifier generation attempts before giving up
pub const IBAN_MAX_ATTEMPTS: u32 = 5;

#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    ibans: Arc<dyn IbanGenerator>,
    bank_code: String,
    swift_code: String,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>, settings: &LedgerSettings) -> Self {
        Self {
            store,
            ibans: Arc::new(RandomIbanGenerator),
            bank_code: settings.bank_code.clone(),
            swift_code: settings.swift_code.clone(),
        }
    }

    pub fn with_iban_generator(mut self, ibans: Arc<dyn IbanGenerator>) -> Self {
        self.ibans = ibans;
        self
    }

    pub async fn get_account(&self, id: Uuid) -> AppResult<Account> {
        self.store
            .find_account(id)
            .await?
            .ok_or_else(|| DomainError::account_not_found(id).into())
    }

    /// Load an account the actor owns, or any account for an admin
    pub async fn get_owned_account(&self, context: &OperationContext, id: Uuid) -> AppResult<Account> {
        require_actor(context)?;
        let account = self.get_account(id).await?;
        ensure_access(context, &account)?;
        Ok(account)
    }

    pub async fn list_accounts(&self, context: &OperationContext) -> AppResult<Vec<Account>> {
        let actor = require_actor(context)?;
        Ok(self.store.accounts_by_owner(actor).await?)
    }

    /// Public lookup used to address an external transfer
    pub async fn find_by_iban(&self, iban: &str) -> AppResult<PublicAccount> {
        let iban = iban.trim().to_ascii_uppercase();
        self.store
            .find_account_by_iban(&iban)
            .await?
            .map(|account| account.public_view())
            .ok_or_else(|| DomainError::account_not_found(iban).into())
    }

    /// Open a zero-balance account for the actor.
    ///
    /// Users without SUPER_USER or ADMIN may hold a single account.
    pub async fn create_account(&self, context: &OperationContext, currency: Currency) -> AppResult<Account> {
        let owner_id = require_actor(context)?;

        if !context.is_upgraded() && !self.store.accounts_by_owner(owner_id).await?.is_empty() {
            return Err(DomainError::AccountLimitReached.into());
        }

        for attempt in 1..=IBAN_MAX_ATTEMPTS {
            match self.try_open(owner_id, currency).await {
                Ok(account) => {
                    tracing::info!(
                        account_id = %account.id,
                        owner_id = %owner_id,
                        currency = %currency,
                        "Account created"
                    );
                    return Ok(account);
                }
                Err(AppError::Domain(DomainError::IdentifierCollision(iban))) => {
                    tracing::warn!(attempt, iban = %iban, "Account identifier collision, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(DomainError::GenerationExhausted { attempts: IBAN_MAX_ATTEMPTS }.into())
    }

    async fn try_open(&self, owner_id: Uuid, currency: Currency) -> AppResult<Account> {
        let iban = self.ibans.generate(currency, &self.bank_code);

        if self.store.iban_exists(&iban).await? {
            return Err(DomainError::IdentifierCollision(iban).into());
        }

        let account = Account::open(owner_id, currency, iban, self.swift_code.clone());
        match self.store.insert_account(&account).await {
            Ok(()) => Ok(account),
            Err(e) if e.is_unique_violation() => Err(DomainError::IdentifierCollision(account.iban).into()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete an empty account under its row lock
    pub async fn delete_account(&self, context: &OperationContext, id: Uuid) -> AppResult<()> {
        require_actor(context)?;

        let mut uow = self.store.begin().await?;
        let account = uow
            .lock_account(id)
            .await?
            .ok_or_else(|| DomainError::account_not_found(id))?;

        ensure_access(context, &account)?;

        if !account.balance.is_zero() {
            return Err(DomainError::NonZeroBalance {
                balance: account.balance.value(),
            }
            .into());
        }

        uow.delete_account(id).await?;
        uow.commit().await?;

        tracing::info!(account_id = %id, "Account deleted");
        Ok(())
    }

    /// Lock, apply a signed delta, persist. Returns the updated account.
    pub async fn adjust_balance(
        &self,
        uow: &mut dyn UnitOfWork,
        account_id: Uuid,
        delta: Decimal,
    ) -> AppResult<Account> {
        let mut account = uow
            .lock_account(account_id)
            .await?
            .ok_or_else(|| DomainError::account_not_found(account_id))?;

        let expected_version = account.version;
        account.apply_delta(delta)?;
        uow.save_account(&account, expected_version).await?;

        tracing::debug!(
            account_id = %account_id,
            delta = %delta,
            balance = %account.balance,
            version = account.version,
            "Balance adjusted"
        );

        Ok(account)
    }
}
