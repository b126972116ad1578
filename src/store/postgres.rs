//! Postgres adapter
//!
//! Row locks are `SELECT ... FOR UPDATE` inside a sqlx transaction; balance
//! writes additionally check the stored version.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::{
    Account, Balance, Currency, NewTransaction, Page, PageRequest, Privilege, SortDirection,
    TopUpLog, TransactionRecord,
};

use super::{LedgerStore, StoreError, UnitOfWork};

const ACCOUNT_COLUMNS: &str =
    "id, owner_id, currency, balance, iban, swift_code, version, created_at";

const TRANSACTION_COLUMNS: &str = "id, initiator_id, from_account_id, to_account_id, type, status, \
     amount_from, currency_from, amount_to, currency_to, fx_rate, external_ref, description, created_at";

/// Ledger store backed by a Postgres pool
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn page_transactions(
        &self,
        filter: &str,
        key: Uuid,
        page: PageRequest,
    ) -> Result<Page<TransactionRecord>, StoreError> {
        let page = page.normalized();

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM transactions WHERE {}", filter))
            .bind(key)
            .fetch_one(&self.pool)
            .await?;

        let order = match page.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        let sql = format!(
            "SELECT {} FROM transactions WHERE {} ORDER BY id {} LIMIT $2 OFFSET $3",
            TRANSACTION_COLUMNS, filter, order
        );

        let rows = sqlx::query(&sql)
            .bind(key)
            .bind(page.size as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        let content = rows
            .iter()
            .map(transaction_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(content, page, total.max(0) as u64))
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx: Some(tx) }))
    }

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM accounts WHERE id = $1", ACCOUNT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn find_account_by_iban(&self, iban: &str) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM accounts WHERE iban = $1", ACCOUNT_COLUMNS))
            .bind(iban)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn accounts_by_owner(&self, owner_id: Uuid) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE owner_id = $1 ORDER BY created_at, id",
            ACCOUNT_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(account_from_row).collect()
    }

    async fn iban_exists(&self, iban: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM accounts WHERE iban = $1)")
            .bind(iban)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, owner_id, currency, balance, iban, swift_code, version, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(account.id)
        .bind(account.owner_id)
        .bind(account.currency.code())
        .bind(account.balance.value())
        .bind(&account.iban)
        .bind(&account.swift_code)
        .bind(account.version)
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_or_database(e, &account.iban))?;

        Ok(())
    }

    async fn find_top_up(&self, session_id: &str) -> Result<Option<TopUpLog>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT session_id, account_id, amount_paid, paid_currency,
                   amount_credited, credited_currency, processed_at
            FROM top_up_logs
            WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(top_up_from_row).transpose()
    }

    async fn transactions_by_initiator(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<TransactionRecord>, StoreError> {
        self.page_transactions("initiator_id = $1", user_id, page).await
    }

    async fn transactions_by_account(
        &self,
        account_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<TransactionRecord>, StoreError> {
        self.page_transactions("(from_account_id = $1 OR to_account_id = $1)", account_id, page)
            .await
    }

    async fn privileges(&self, user_id: Uuid) -> Result<Vec<Privilege>, StoreError> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT privilege FROM user_privileges WHERE user_id = $1 ORDER BY privilege",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        names
            .iter()
            .map(|name| name.parse::<Privilege>().map_err(StoreError::Corrupt))
            .collect()
    }

    async fn has_privilege(&self, user_id: Uuid, privilege: Privilege) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM user_privileges WHERE user_id = $1 AND privilege = $2)",
        )
        .bind(user_id)
        .bind(privilege.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

/// Unit of work over one Postgres transaction. Dropping it rolls back.
pub struct PgUnitOfWork {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgUnitOfWork {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, StoreError> {
        self.tx.as_mut().ok_or(StoreError::Closed)
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn lock_account(&mut self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let tx = self.tx()?;
        let row = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE id = $1 FOR UPDATE",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn save_account(&mut self, account: &Account, expected_version: i64) -> Result<(), StoreError> {
        let tx = self.tx()?;
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = $1, version = $2
            WHERE id = $3 AND version = $4
            "#,
        )
        .bind(account.balance.value())
        .bind(account.version)
        .bind(account.id)
        .bind(expected_version)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::VersionConflict {
                account_id: account.id,
                expected: expected_version,
            });
        }

        Ok(())
    }

    async fn delete_account(&mut self, id: Uuid) -> Result<(), StoreError> {
        let tx = self.tx()?;
        sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn append_transaction(&mut self, new_tx: NewTransaction) -> Result<TransactionRecord, StoreError> {
        let tx = self.tx()?;
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO transactions (
                initiator_id, from_account_id, to_account_id, type, status,
                amount_from, currency_from, amount_to, currency_to,
                fx_rate, external_ref, description
            )
            VALUES ($1, $2, $3, $4, 'SUCCESS', $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(new_tx.initiator_id)
        .bind(new_tx.from_account_id)
        .bind(new_tx.to_account_id)
        .bind(new_tx.kind.as_str())
        .bind(new_tx.amount_from)
        .bind(new_tx.currency_from.map(|c| c.code()))
        .bind(new_tx.amount_to)
        .bind(new_tx.currency_to.map(|c| c.code()))
        .bind(new_tx.fx_rate)
        .bind(&new_tx.external_ref)
        .bind(&new_tx.description)
        .fetch_one(&mut **tx)
        .await?;

        transaction_from_row(&row)
    }

    async fn insert_top_up(&mut self, log: &TopUpLog) -> Result<bool, StoreError> {
        let tx = self.tx()?;
        // Blocks on a concurrent uncommitted insert of the same key
        let result = sqlx::query(
            r#"
            INSERT INTO top_up_logs (
                session_id, account_id, amount_paid, paid_currency,
                amount_credited, credited_currency, processed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (session_id) DO NOTHING
            "#,
        )
        .bind(&log.session_id)
        .bind(log.account_id)
        .bind(log.amount_paid)
        .bind(log.paid_currency.code())
        .bind(log.amount_credited)
        .bind(log.credited_currency.code())
        .bind(log.processed_at)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn grant_privilege(&mut self, user_id: Uuid, privilege: Privilege) -> Result<(), StoreError> {
        let tx = self.tx()?;
        sqlx::query("INSERT INTO user_privileges (user_id, privilege) VALUES ($1, $2)")
            .bind(user_id)
            .bind(privilege.as_str())
            .execute(&mut **tx)
            .await
            .map_err(|e| unique_or_database(e, privilege.as_str()))?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::Closed)?;
        tx.commit().await?;
        Ok(())
    }
}

fn unique_or_database(err: sqlx::Error, what: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::UniqueViolation(what.to_string())
        }
        _ => StoreError::Database(err),
    }
}

fn parse_currency(code: &str) -> Result<Currency, StoreError> {
    code.parse::<Currency>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn account_from_row(row: &PgRow) -> Result<Account, StoreError> {
    let currency: String = row.try_get("currency")?;
    let balance = Balance::new(row.try_get("balance")?)
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;

    Ok(Account {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        currency: parse_currency(&currency)?,
        balance,
        iban: row.try_get("iban")?,
        swift_code: row.try_get("swift_code")?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
    })
}

fn transaction_from_row(row: &PgRow) -> Result<TransactionRecord, StoreError> {
    let kind: String = row.try_get("type")?;
    let status: String = row.try_get("status")?;
    if status != "SUCCESS" {
        return Err(StoreError::Corrupt(format!("unexpected status {}", status)));
    }
    let currency_from: Option<String> = row.try_get("currency_from")?;
    let currency_to: Option<String> = row.try_get("currency_to")?;

    Ok(TransactionRecord {
        id: row.try_get("id")?,
        initiator_id: row.try_get("initiator_id")?,
        from_account_id: row.try_get("from_account_id")?,
        to_account_id: row.try_get("to_account_id")?,
        kind: kind.parse().map_err(StoreError::Corrupt)?,
        status: crate::domain::TransactionStatus::Success,
        amount_from: row.try_get("amount_from")?,
        currency_from: currency_from.as_deref().map(parse_currency).transpose()?,
        amount_to: row.try_get("amount_to")?,
        currency_to: currency_to.as_deref().map(parse_currency).transpose()?,
        fx_rate: row.try_get("fx_rate")?,
        external_ref: row.try_get("external_ref")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
    })
}

fn top_up_from_row(row: &PgRow) -> Result<TopUpLog, StoreError> {
    let paid: String = row.try_get("paid_currency")?;
    let credited: String = row.try_get("credited_currency")?;

    Ok(TopUpLog {
        session_id: row.try_get("session_id")?,
        account_id: row.try_get("account_id")?,
        amount_paid: row.try_get("amount_paid")?,
        paid_currency: parse_currency(&paid)?,
        amount_credited: row.try_get("amount_credited")?,
        credited_currency: parse_currency(&credited)?,
        processed_at: row.try_get("processed_at")?,
    })
}
