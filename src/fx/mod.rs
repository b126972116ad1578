//! Currency conversion
//!
//! [`FxConverter`] wraps an external rate provider, short-circuits same
//! currency conversions and rounds every result to cents.

mod frankfurter;

pub use frankfurter::{extract_rate, FrankfurterClient};

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::domain::{round_money, Currency};

/// Errors from the FX rate source
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FxError {
    /// Transport, parse or provider-side failure
    #[error("FX provider unavailable: {0}")]
    Unavailable(String),

    #[error("No FX rate for {from} -> {to}")]
    RateNotFound { from: String, to: String },
}

impl FxError {
    pub fn rate_not_found(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::RateNotFound {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            FxError::Unavailable(_) => "fx_unavailable",
            FxError::RateNotFound { .. } => "fx_rate_not_found",
        }
    }
}

/// Remote source converting an amount between two currencies.
#[async_trait]
pub trait FxRateProvider: Send + Sync {
    /// Convert `amount` of `from` into `to`. The result is not rounded.
    async fn convert(&self, amount: Decimal, from: Currency, to: Currency) -> Result<Decimal, FxError>;
}

#[derive(Clone)]
pub struct FxConverter {
    provider: Arc<dyn FxRateProvider>,
}

impl FxConverter {
    pub fn new(provider: Arc<dyn FxRateProvider>) -> Self {
        Self { provider }
    }

    /// Convert and round half-up to 2 decimal places.
    ///
    /// Equal currencies never reach the provider.
    pub async fn convert(&self, amount: Decimal, from: Currency, to: Currency) -> Result<Decimal, FxError> {
        if from == to {
            return Ok(round_money(amount));
        }

        let converted = self.provider.convert(amount, from, to).await?;
        tracing::debug!(%from, %to, %amount, %converted, "FX conversion");

        Ok(round_money(converted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        rate: Decimal,
    }

    #[async_trait]
    impl FxRateProvider for CountingProvider {
        async fn convert(&self, amount: Decimal, _from: Currency, _to: Currency) -> Result<Decimal, FxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(amount * self.rate)
        }
    }

    #[tokio::test]
    async fn test_same_currency_skips_provider() {
        let provider = Arc::new(CountingProvider { calls: AtomicUsize::new(0), rate: dec!(2) });
        let fx = FxConverter::new(provider.clone());

        let converted = fx.convert(dec!(10.005), Currency::Eur, Currency::Eur).await.unwrap();

        assert_eq!(converted, dec!(10.01));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cross_currency_rounds_half_up() {
        let provider = Arc::new(CountingProvider { calls: AtomicUsize::new(0), rate: dec!(4.3333) });
        let fx = FxConverter::new(provider.clone());

        // 1.5 * 4.3333 = 6.49995
        let converted = fx.convert(dec!(1.5), Currency::Eur, Currency::Pln).await.unwrap();

        assert_eq!(converted, dec!(6.50));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
