//! Domain module
//!
//! Core domain types and business rules, free of infrastructure.

pub mod account;
pub mod amount;
pub mod context;
pub mod currency;
pub mod error;
pub mod transaction;

pub use account::{Account, IbanGenerator, PublicAccount, RandomIbanGenerator};
pub use amount::{round_money, round_rate, Amount, AmountError, Balance, FxRate};
pub use context::{OperationContext, Privilege};
pub use currency::{Currency, UnsupportedCurrency};
pub use error::DomainError;
pub use transaction::{
    NewTransaction, Page, PageRequest, SortDirection, TopUpLog, TransactionRecord,
    TransactionStatus, TransactionType,
};
