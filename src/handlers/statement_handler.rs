//! Statement Handler
//!
//! Paged reads over the transaction log.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{DomainError, OperationContext, Page, PageRequest, TransactionRecord};
use crate::error::AppResult;
use crate::store::LedgerStore;

use super::{ensure_access, require_actor};

#[derive(Clone)]
pub struct TransactionLog {
    store: Arc<dyn LedgerStore>,
}

impl TransactionLog {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Rows the actor initiated
    pub async fn for_initiator(
        &self,
        context: &OperationContext,
        page: PageRequest,
    ) -> AppResult<Page<TransactionRecord>> {
        let actor = require_actor(context)?;
        Ok(self
            .store
            .transactions_by_initiator(actor, page.normalized())
            .await?)
    }

    /// Rows touching an account the actor owns (or any account for an admin).
    ///
    /// Rows outlive a deleted account; only an admin can still read them.
    pub async fn for_account(
        &self,
        context: &OperationContext,
        account_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<TransactionRecord>> {
        require_actor(context)?;
        match self.store.find_account(account_id).await? {
            Some(account) => ensure_access(context, &account)?,
            None if context.is_admin() => {
                tracing::debug!(account_id = %account_id, "Admin reading history of a removed account");
            }
            None => return Err(DomainError::account_not_found(account_id).into()),
        }

        Ok(self
            .store
            .transactions_by_account(account_id, page.normalized())
            .await?)
    }
}
