//! Payment gateway port
//!
//! Hosted checkout sessions: creation for top-ups and retrieval for
//! verification. [`StripeGateway`] talks to a Stripe-compatible API.

mod stripe;

pub use stripe::StripeGateway;

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::domain::Currency;

/// Longest session id accepted from callers
pub const MAX_SESSION_ID_LEN: usize = 255;

/// Whether `id` looks like a gateway session id: non-empty ASCII
/// alphanumerics and underscores only.
///
/// Session ids are placed in request paths, so anything else is refused
/// before a request is built.
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Errors from the payment gateway
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("Payment session not found: {0}")]
    SessionNotFound(String),

    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::SessionNotFound(_) => "session_not_found",
            GatewayError::Unavailable(_) => "gateway_unavailable",
        }
    }
}

/// A checkout session as reported by the gateway.
///
/// Amounts are in minor units; `currency` is whatever case the gateway uses.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub payment_status: String,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub amount_subtotal: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status.eq_ignore_ascii_case("paid")
    }

    /// Total if present, else subtotal
    pub fn amount_minor_units(&self) -> Option<i64> {
        self.amount_total.or(self.amount_subtotal)
    }
}

/// Parameters for a single-line-item hosted checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCheckoutSession {
    pub amount_minor_units: i64,
    pub currency: Currency,
    pub product_name: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: BTreeMap<String, String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn get_session(&self, session_id: &str) -> Result<CheckoutSession, GatewayError>;

    async fn create_session(&self, request: NewCheckoutSession) -> Result<CheckoutSession, GatewayError>;
}
