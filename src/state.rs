//! Shared application state
//!
//! Engines are built once from the injected collaborators and cloned into
//! each request.

use std::sync::Arc;

use crate::config::LedgerSettings;
use crate::domain::IbanGenerator;
use crate::error::AppResult;
use crate::fx::{FxConverter, FxRateProvider};
use crate::gateway::PaymentGateway;
use crate::handlers::{FeatureBillingEngine, Ledger, TopUpProcessor, TransactionLog, TransferEngine};
use crate::store::LedgerStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub ledger: Ledger,
    pub transfers: TransferEngine,
    pub top_ups: TopUpProcessor,
    pub billing: FeatureBillingEngine,
    pub statements: TransactionLog,
}

impl AppState {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        fx_provider: Arc<dyn FxRateProvider>,
        gateway: Arc<dyn PaymentGateway>,
        settings: &LedgerSettings,
    ) -> AppResult<Self> {
        let ledger = Ledger::new(Arc::clone(&store), settings);
        Self::with_ledger(store, ledger, fx_provider, gateway, settings)
    }

    /// Same as `new` with a custom identifier source
    pub fn with_iban_generator(
        store: Arc<dyn LedgerStore>,
        fx_provider: Arc<dyn FxRateProvider>,
        gateway: Arc<dyn PaymentGateway>,
        settings: &LedgerSettings,
        ibans: Arc<dyn IbanGenerator>,
    ) -> AppResult<Self> {
        let ledger = Ledger::new(Arc::clone(&store), settings).with_iban_generator(ibans);
        Self::with_ledger(store, ledger, fx_provider, gateway, settings)
    }

    fn with_ledger(
        store: Arc<dyn LedgerStore>,
        ledger: Ledger,
        fx_provider: Arc<dyn FxRateProvider>,
        gateway: Arc<dyn PaymentGateway>,
        settings: &LedgerSettings,
    ) -> AppResult<Self> {
        let fx = FxConverter::new(fx_provider);

        Ok(Self {
            transfers: TransferEngine::new(Arc::clone(&store), ledger.clone(), fx.clone()),
            top_ups: TopUpProcessor::new(Arc::clone(&store), ledger.clone(), fx.clone(), gateway, settings),
            billing: FeatureBillingEngine::new(Arc::clone(&store), ledger.clone(), fx, settings)?,
            statements: TransactionLog::new(Arc::clone(&store)),
            ledger,
            store,
        })
    }
}
