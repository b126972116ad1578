//! Transfer Handler
//!
//! Moves money between two accounts, converting currency when they differ.

use std::sync::Arc;

use crate::domain::{
    Amount, DomainError, FxRate, NewTransaction, OperationContext, TransactionType,
};
use crate::error::AppResult;
use crate::fx::FxConverter;
use crate::store::LedgerStore;

use super::{converted_amount, require_actor, Ledger, TransferCommand, TransferResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// Both accounts belong to the initiator
    Internal,
    /// Destination belongs to someone else
    External,
}

impl TransferKind {
    fn transaction_type(&self) -> TransactionType {
        match self {
            TransferKind::Internal => TransactionType::TransferInternal,
            TransferKind::External => TransactionType::TransferExternal,
        }
    }

    fn default_description(&self) -> &'static str {
        match self {
            TransferKind::Internal => "Internal transfer",
            TransferKind::External => "External transfer",
        }
    }
}

/// Handler for internal and external transfers
#[derive(Clone)]
pub struct TransferEngine {
    store: Arc<dyn LedgerStore>,
    ledger: Ledger,
    fx: FxConverter,
}

impl TransferEngine {
    pub fn new(store: Arc<dyn LedgerStore>, ledger: Ledger, fx: FxConverter) -> Self {
        Self { store, ledger, fx }
    }

    pub async fn internal(&self, context: &OperationContext, command: TransferCommand) -> AppResult<TransferResult> {
        self.execute(TransferKind::Internal, context, command).await
    }

    pub async fn external(&self, context: &OperationContext, command: TransferCommand) -> AppResult<TransferResult> {
        self.execute(TransferKind::External, context, command).await
    }

    /// Execute the transfer command
    pub async fn execute(
        &self,
        kind: TransferKind,
        context: &OperationContext,
        command: TransferCommand,
    ) -> AppResult<TransferResult> {
        let initiator = require_actor(context)?;

        if command.from_account_id == command.to_account_id {
            return Err(DomainError::SameAccount.into());
        }

        let amount: Amount = command
            .amount
            .parse()
            .map_err(|e| DomainError::InvalidAmount(format!("{}", e)))?;

        let from = self.ledger.get_account(command.from_account_id).await?;
        let to = self.ledger.get_account(command.to_account_id).await?;

        if !from.is_owned_by(initiator) {
            return Err(DomainError::forbidden("source account belongs to another user").into());
        }
        match kind {
            TransferKind::Internal if !to.is_owned_by(initiator) => {
                return Err(DomainError::forbidden("destination account belongs to another user").into());
            }
            TransferKind::External if to.is_owned_by(initiator) => {
                return Err(DomainError::InvalidOperation(
                    "use internal transfer for your own accounts".to_string(),
                )
                .into());
            }
            _ => {}
        }

        // FX happens before any lock is taken
        let (credited, fx_rate) = if from.currency == to.currency {
            (amount, FxRate::identity())
        } else {
            let converted = self.fx.convert(amount.value(), from.currency, to.currency).await?;
            let credited = converted_amount(converted)?;
            (credited, FxRate::between(&amount, &credited))
        };

        if !from.balance.is_sufficient_for(&amount) {
            return Err(DomainError::insufficient_funds(amount.value(), from.balance.value()).into());
        }

        let mut uow = self.store.begin().await?;

        // Lock in ascending id order so opposing transfers cannot deadlock
        let mut ordered = [from.id, to.id];
        ordered.sort();
        for id in ordered {
            uow.lock_account(id)
                .await?
                .ok_or_else(|| DomainError::account_not_found(id))?;
        }

        // Funds are re-checked under the lock by apply_delta
        self.ledger.adjust_balance(uow.as_mut(), from.id, -amount.value()).await?;
        self.ledger.adjust_balance(uow.as_mut(), to.id, credited.value()).await?;

        let description = command
            .memo
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| kind.default_description().to_string());

        let record = uow
            .append_transaction(NewTransaction {
                initiator_id: initiator,
                from_account_id: Some(from.id),
                to_account_id: Some(to.id),
                kind: kind.transaction_type(),
                amount_from: Some(amount.value()),
                currency_from: Some(from.currency),
                amount_to: Some(credited.value()),
                currency_to: Some(to.currency),
                fx_rate: fx_rate.value(),
                external_ref: None,
                description,
            })
            .await?;

        uow.commit().await?;

        tracing::info!(
            transaction_id = record.id,
            kind = %record.kind,
            from_account_id = %from.id,
            to_account_id = %to.id,
            debited = %amount,
            credited = %credited,
            fx_rate = %fx_rate,
            "Transfer completed"
        );

        Ok(TransferResult {
            transaction_id: record.id,
            from_account_id: from.id,
            to_account_id: to.id,
            debited_amount: amount.value(),
            debited_currency: from.currency,
            credited_amount: credited.value(),
            credited_currency: to.currency,
            fx_rate: fx_rate.value(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_transfer_command_with_memo() {
        let cmd = TransferCommand::new(Uuid::new_v4(), Uuid::new_v4(), "50.00").with_memo("Rent");

        assert_eq!(cmd.amount, "50.00");
        assert_eq!(cmd.memo, Some("Rent".to_string()));
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(TransferKind::Internal.transaction_type(), TransactionType::TransferInternal);
        assert_eq!(TransferKind::External.transaction_type(), TransactionType::TransferExternal);
        assert_eq!(TransferKind::External.default_description(), "External transfer");
    }
}
