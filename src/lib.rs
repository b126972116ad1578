//! RaxBank ledger library
//!
//! Re-exports modules for the server binary, the load test and integration
//! tests.

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
mod error;
pub mod fx;
pub mod gateway;
pub mod handlers;
pub mod state;
pub mod store;

pub use config::{Config, LedgerSettings};
pub use domain::{Account, Amount, AmountError, Balance, Currency, DomainError, OperationContext, Privilege};
pub use error::{AppError, AppResult, ErrorKind, ErrorResponse};
pub use state::AppState;
