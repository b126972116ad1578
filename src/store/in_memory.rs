//! In-memory adapter
//!
//! Committed state sits behind a std mutex that is never held across an
//! await. Row locks are per-account tokio mutexes whose owned guards live in
//! the unit of work, so they are released on commit or drop just like
//! `FOR UPDATE` locks. Writes are buffered and applied in one step at commit.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::{
    Account, NewTransaction, Page, PageRequest, Privilege, SortDirection, TopUpLog,
    TransactionRecord,
};

use super::{LedgerStore, StoreError, UnitOfWork};

#[derive(Default)]
struct State {
    accounts: HashMap<Uuid, Account>,
    transactions: Vec<TransactionRecord>,
    next_transaction_id: i64,
    top_ups: HashMap<String, TopUpLog>,
    privileges: HashSet<(Uuid, Privilege)>,
    row_locks: HashMap<Uuid, Arc<RowLock<()>>>,
    // Keys claimed by open units of work
    reserved_sessions: HashSet<String>,
    reserved_grants: HashSet<(Uuid, Privilege)>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
}

impl Shared {
    fn state(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

/// Ledger store held entirely in process memory
#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    shared: Arc<Shared>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put an account in place as-is, bypassing identifier checks
    pub fn seed_account(&self, account: Account) -> Result<(), StoreError> {
        self.shared.state()?.accounts.insert(account.id, account);
        Ok(())
    }

    pub fn seed_privilege(&self, user_id: Uuid, privilege: Privilege) -> Result<(), StoreError> {
        self.shared.state()?.privileges.insert((user_id, privilege));
        Ok(())
    }

    fn page_where<F>(&self, page: PageRequest, filter: F) -> Result<Page<TransactionRecord>, StoreError>
    where
        F: Fn(&TransactionRecord) -> bool,
    {
        let page = page.normalized();
        let mut rows: Vec<TransactionRecord> = self
            .shared
            .state()?
            .transactions
            .iter()
            .filter(|tx| filter(tx))
            .cloned()
            .collect();

        rows.sort_by_key(|tx| tx.id);
        if page.direction == SortDirection::Desc {
            rows.reverse();
        }

        Ok(Page::from_sorted(rows, page))
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        Ok(Box::new(InMemoryUnitOfWork {
            shared: Arc::clone(&self.shared),
            guards: HashMap::new(),
            accounts: HashMap::new(),
            transactions: Vec::new(),
            top_ups: Vec::new(),
            grants: Vec::new(),
            closed: false,
        }))
    }

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.shared.state()?.accounts.get(&id).cloned())
    }

    async fn find_account_by_iban(&self, iban: &str) -> Result<Option<Account>, StoreError> {
        Ok(self
            .shared
            .state()?
            .accounts
            .values()
            .find(|a| a.iban == iban)
            .cloned())
    }

    async fn accounts_by_owner(&self, owner_id: Uuid) -> Result<Vec<Account>, StoreError> {
        let mut accounts: Vec<Account> = self
            .shared
            .state()?
            .accounts
            .values()
            .filter(|a| a.owner_id == owner_id)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(accounts)
    }

    async fn iban_exists(&self, iban: &str) -> Result<bool, StoreError> {
        Ok(self.shared.state()?.accounts.values().any(|a| a.iban == iban))
    }

    async fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        let mut state = self.shared.state()?;
        if state.accounts.values().any(|a| a.iban == account.iban) {
            return Err(StoreError::UniqueViolation(account.iban.clone()));
        }
        if state.accounts.contains_key(&account.id) {
            return Err(StoreError::UniqueViolation(account.id.to_string()));
        }
        state.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn find_top_up(&self, session_id: &str) -> Result<Option<TopUpLog>, StoreError> {
        Ok(self.shared.state()?.top_ups.get(session_id).cloned())
    }

    async fn transactions_by_initiator(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<TransactionRecord>, StoreError> {
        self.page_where(page, |tx| tx.initiator_id == user_id)
    }

    async fn transactions_by_account(
        &self,
        account_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<TransactionRecord>, StoreError> {
        self.page_where(page, |tx| tx.touches(account_id))
    }

    async fn privileges(&self, user_id: Uuid) -> Result<Vec<Privilege>, StoreError> {
        let mut privileges: Vec<Privilege> = self
            .shared
            .state()?
            .privileges
            .iter()
            .filter(|(user, _)| *user == user_id)
            .map(|(_, p)| *p)
            .collect();
        privileges.sort();
        Ok(privileges)
    }
}

/// Buffered unit of work holding per-row locks
pub struct InMemoryUnitOfWork {
    shared: Arc<Shared>,
    guards: HashMap<Uuid, OwnedMutexGuard<()>>,
    // Locked rows as this unit sees them; `None` marks a pending delete
    accounts: HashMap<Uuid, Option<Account>>,
    transactions: Vec<TransactionRecord>,
    top_ups: Vec<TopUpLog>,
    grants: Vec<(Uuid, Privilege)>,
    closed: bool,
}

impl InMemoryUnitOfWork {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn release_reservations(&mut self, state: &mut State) {
        for log in self.top_ups.drain(..) {
            state.reserved_sessions.remove(&log.session_id);
        }
        for grant in self.grants.drain(..) {
            state.reserved_grants.remove(&grant);
        }
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn lock_account(&mut self, id: Uuid) -> Result<Option<Account>, StoreError> {
        self.ensure_open()?;

        if !self.guards.contains_key(&id) {
            let lock = {
                let mut state = self.shared.state()?;
                Arc::clone(state.row_locks.entry(id).or_default())
            };
            let guard = lock.lock_owned().await;
            self.guards.insert(id, guard);

            let current = self.shared.state()?.accounts.get(&id).cloned();
            self.accounts.insert(id, current);
        }

        Ok(self.accounts.get(&id).cloned().flatten())
    }

    async fn save_account(&mut self, account: &Account, expected_version: i64) -> Result<(), StoreError> {
        self.ensure_open()?;

        let current = match self.accounts.get(&account.id) {
            Some(Some(locked)) => locked.version,
            _ => {
                return Err(StoreError::VersionConflict {
                    account_id: account.id,
                    expected: expected_version,
                })
            }
        };

        if current != expected_version {
            return Err(StoreError::VersionConflict {
                account_id: account.id,
                expected: expected_version,
            });
        }

        self.accounts.insert(account.id, Some(account.clone()));
        Ok(())
    }

    async fn delete_account(&mut self, id: Uuid) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.accounts.insert(id, None);
        Ok(())
    }

    async fn append_transaction(&mut self, tx: NewTransaction) -> Result<TransactionRecord, StoreError> {
        self.ensure_open()?;

        let id = {
            let mut state = self.shared.state()?;
            state.next_transaction_id += 1;
            state.next_transaction_id
        };

        let record = TransactionRecord::from_new(id, tx, Utc::now());
        self.transactions.push(record.clone());
        Ok(record)
    }

    async fn insert_top_up(&mut self, log: &TopUpLog) -> Result<bool, StoreError> {
        self.ensure_open()?;

        let mut state = self.shared.state()?;
        if state.top_ups.contains_key(&log.session_id)
            || !state.reserved_sessions.insert(log.session_id.clone())
        {
            return Ok(false);
        }
        drop(state);

        self.top_ups.push(log.clone());
        Ok(true)
    }

    async fn grant_privilege(&mut self, user_id: Uuid, privilege: Privilege) -> Result<(), StoreError> {
        self.ensure_open()?;

        let key = (user_id, privilege);
        let mut state = self.shared.state()?;
        if state.privileges.contains(&key) || !state.reserved_grants.insert(key) {
            return Err(StoreError::UniqueViolation(privilege.as_str().to_string()));
        }
        drop(state);

        self.grants.push(key);
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;

        let shared = Arc::clone(&self.shared);
        let mut state = shared.state()?;

        for (id, account) in self.accounts.drain() {
            match account {
                Some(account) => {
                    state.accounts.insert(id, account);
                }
                None => {
                    state.accounts.remove(&id);
                }
            }
        }
        state.transactions.append(&mut self.transactions);
        for log in &self.top_ups {
            state.top_ups.insert(log.session_id.clone(), log.clone());
        }
        for grant in &self.grants {
            state.privileges.insert(*grant);
        }
        self.release_reservations(&mut state);
        drop(state);

        self.closed = true;
        self.guards.clear();
        Ok(())
    }
}

impl Drop for InMemoryUnitOfWork {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let shared = Arc::clone(&self.shared);
        if let Ok(mut state) = shared.state.lock() {
            self.release_reservations(&mut state);
        };
    }
}
