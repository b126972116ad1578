//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use axum::Router;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use raxbank_ledger::fx::{FxError, FxRateProvider};
use raxbank_ledger::gateway::{CheckoutSession, GatewayError, NewCheckoutSession, PaymentGateway};
use raxbank_ledger::store::{InMemoryLedgerStore, LedgerStore};
use raxbank_ledger::{api, Account, AppState, Balance, Currency, LedgerSettings};

/// Fixed-rate FX source
#[derive(Default)]
pub struct FixedRates(pub HashMap<(Currency, Currency), Decimal>);

impl FixedRates {
    pub fn with(mut self, from: Currency, to: Currency, rate: Decimal) -> Self {
        self.0.insert((from, to), rate);
        self
    }
}

#[async_trait]
impl FxRateProvider for FixedRates {
    async fn convert(&self, amount: Decimal, from: Currency, to: Currency) -> Result<Decimal, FxError> {
        self.0
            .get(&(from, to))
            .map(|rate| amount * rate)
            .ok_or_else(|| FxError::rate_not_found(from.code(), to.code()))
    }
}

/// Gateway holding sessions in memory
#[derive(Default)]
pub struct FakeGateway {
    sessions: Mutex<HashMap<String, CheckoutSession>>,
}

impl FakeGateway {
    /// Register a paid session crediting `account`
    pub fn paid(&self, id: &str, minor: i64, currency: &str, account_id: Uuid, account_currency: Currency) {
        let mut metadata = BTreeMap::new();
        metadata.insert("type".to_string(), "topup".to_string());
        metadata.insert("accountId".to_string(), account_id.to_string());
        metadata.insert("accountCurrency".to_string(), account_currency.code().to_string());

        self.sessions.lock().unwrap().insert(
            id.to_string(),
            CheckoutSession {
                id: id.to_string(),
                payment_status: "paid".to_string(),
                amount_total: Some(minor),
                currency: Some(currency.to_string()),
                metadata,
                ..Default::default()
            },
        );
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn get_session(&self, session_id: &str) -> Result<CheckoutSession, GatewayError> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| GatewayError::SessionNotFound(session_id.to_string()))
    }

    async fn create_session(&self, request: NewCheckoutSession) -> Result<CheckoutSession, GatewayError> {
        let id = format!("cs_test_{}", Uuid::new_v4().simple());
        let session = CheckoutSession {
            id: id.clone(),
            payment_status: "unpaid".to_string(),
            amount_total: Some(request.amount_minor_units),
            currency: Some(request.currency.code().to_lowercase()),
            metadata: request.metadata,
            url: Some(format!("https://checkout.test/{}", id)),
            ..Default::default()
        };
        self.sessions.lock().unwrap().insert(id, session.clone());
        Ok(session)
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: InMemoryLedgerStore,
    pub gateway: Arc<FakeGateway>,
}

impl TestApp {
    /// Put a funded account in place
    pub fn seed_account(&self, owner: Uuid, currency: Currency, balance: Decimal) -> Account {
        let mut account = Account::open(
            owner,
            currency,
            format!("{}00RAXR{}", currency.country_code(), &Uuid::new_v4().simple().to_string()[..16].to_uppercase()),
            "RAXBANK".to_string(),
        );
        account.balance = Balance::new(balance).unwrap();
        self.store.seed_account(account.clone()).unwrap();
        account
    }

    pub async fn balance(&self, id: Uuid) -> Decimal {
        self.store.find_account(id).await.unwrap().unwrap().balance.value()
    }
}

/// Full router over the in-memory store
pub fn in_memory_app(rates: FixedRates) -> TestApp {
    let store = InMemoryLedgerStore::new();
    let gateway = Arc::new(FakeGateway::default());
    let state = AppState::new(
        Arc::new(store.clone()),
        Arc::new(rates),
        gateway.clone(),
        &LedgerSettings::default(),
    )
    .expect("Failed to build state");

    TestApp {
        router: api::build_router(state),
        store,
        gateway,
    }
}

pub fn json_request(method: &str, uri: &str, user: Option<Uuid>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("X-Request-User-Id", user.to_string());
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn read_json(response: Response<Body>) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&body).unwrap()
}

/// Decimal fields come back as JSON strings
pub fn decimal(value: &Value) -> Decimal {
    value.as_str().expect("decimal as string").parse().unwrap()
}

/// Setup test database - apply the schema and truncate tables
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    pool.execute(include_str!("../../migrations/0001_init.sql"))
        .await
        .expect("Failed to apply schema");

    // Row triggers do not fire on TRUNCATE
    sqlx::query("TRUNCATE TABLE transactions, top_up_logs, user_privileges, accounts RESTART IDENTITY")
        .execute(&pool)
        .await
        .expect("Failed to clean up DB");

    pool
}
