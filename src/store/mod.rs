//! Storage ports
//!
//! `LedgerStore` serves reads and opens units of work. A `UnitOfWork` holds
//! row locks and buffered writes until `commit`; dropping it without commit
//! rolls everything back.
//!
//! Two adapters implement the ports: [`PgLedgerStore`] for production and
//! [`InMemoryLedgerStore`] for tests and local runs.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PgLedgerStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    Account, NewTransaction, Page, PageRequest, Privilege, TopUpLog, TransactionRecord,
};

/// Errors raised by storage adapters
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A unique constraint rejected the write
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The row moved between lock and write
    #[error("Version conflict for account {account_id}: expected {expected}")]
    VersionConflict { account_id: Uuid, expected: i64 },

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Unit of work already closed")]
    Closed,

    #[error("Store state poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation(_))
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }
}

/// Read side of the ledger plus the entry point to atomic writes.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a unit of work
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    async fn find_account_by_iban(&self, iban: &str) -> Result<Option<Account>, StoreError>;

    /// Accounts owned by a user, oldest first
    async fn accounts_by_owner(&self, owner_id: Uuid) -> Result<Vec<Account>, StoreError>;

    async fn iban_exists(&self, iban: &str) -> Result<bool, StoreError>;

    /// Insert a new account; a taken IBAN yields `UniqueViolation`
    async fn insert_account(&self, account: &Account) -> Result<(), StoreError>;

    async fn find_top_up(&self, session_id: &str) -> Result<Option<TopUpLog>, StoreError>;

    async fn transactions_by_initiator(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<TransactionRecord>, StoreError>;

    /// Rows where the account is the source or the destination
    async fn transactions_by_account(
        &self,
        account_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<TransactionRecord>, StoreError>;

    async fn privileges(&self, user_id: Uuid) -> Result<Vec<Privilege>, StoreError>;

    async fn has_privilege(&self, user_id: Uuid, privilege: Privilege) -> Result<bool, StoreError> {
        Ok(self.privileges(user_id).await?.contains(&privilege))
    }
}

/// A scoped atomic unit. Locks are held until commit or drop.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Lock the account row for the rest of the unit. `None` if it is gone.
    async fn lock_account(&mut self, id: Uuid) -> Result<Option<Account>, StoreError>;

    /// Persist a locked account, provided its stored version still equals
    /// `expected_version`.
    async fn save_account(&mut self, account: &Account, expected_version: i64)
        -> Result<(), StoreError>;

    async fn delete_account(&mut self, id: Uuid) -> Result<(), StoreError>;

    async fn append_transaction(&mut self, tx: NewTransaction)
        -> Result<TransactionRecord, StoreError>;

    /// Insert the reconciliation row for a payment session.
    ///
    /// Returns `false` when the session id is already taken, including by a
    /// concurrent unit that has not committed yet.
    async fn insert_top_up(&mut self, log: &TopUpLog) -> Result<bool, StoreError>;

    /// Grant a privilege; an existing grant yields `UniqueViolation`
    async fn grant_privilege(&mut self, user_id: Uuid, privilege: Privilege)
        -> Result<(), StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;
}
