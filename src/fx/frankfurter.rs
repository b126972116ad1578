//! Frankfurter-compatible rate provider
//!
//! `GET {base}/latest?amount=..&from=..&to=..` answers
//! `{"amount":..,"base":"EUR","rates":{"PLN":86.0}}` with the converted amount.

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::Currency;

use super::{FxError, FxRateProvider};

#[derive(Debug, Clone)]
pub struct FrankfurterClient {
    client: reqwest::Client,
    base_url: String,
}

impl FrankfurterClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FxError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FxError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl FxRateProvider for FrankfurterClient {
    async fn convert(&self, amount: Decimal, from: Currency, to: Currency) -> Result<Decimal, FxError> {
        let url = format!("{}/latest", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("amount", amount.to_string()),
                ("from", from.code().to_string()),
                ("to", to.code().to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, %from, %to, "FX provider request failed");
                FxError::Unavailable(e.to_string())
            })?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
                return Err(FxError::rate_not_found(from.code(), to.code()));
            }
            status if !status.is_success() => {
                tracing::warn!(%status, %from, %to, "FX provider returned error status");
                return Err(FxError::Unavailable(format!("provider returned {}", status)));
            }
            _ => {}
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FxError::Unavailable(format!("invalid response body: {}", e)))?;

        extract_rate(&body, from, to)
    }
}

/// Pull the converted amount for `to` out of a provider response body.
pub fn extract_rate(body: &Value, from: Currency, to: Currency) -> Result<Decimal, FxError> {
    let rates = body
        .get("rates")
        .and_then(Value::as_object)
        .ok_or_else(|| FxError::Unavailable("response has no rates".to_string()))?;

    let value = rates
        .get(to.code())
        .ok_or_else(|| FxError::rate_not_found(from.code(), to.code()))?;

    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => return Err(FxError::Unavailable(format!("rate is not numeric: {}", other))),
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| FxError::Unavailable(format!("unparseable rate {}: {}", text, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_extract_rate() {
        let body = json!({"amount": 20.0, "base": "EUR", "date": "2024-05-01", "rates": {"PLN": 86.12}});
        let rate = extract_rate(&body, Currency::Eur, Currency::Pln).unwrap();
        assert_eq!(rate, dec!(86.12));
    }

    #[test]
    fn test_extract_rate_missing_pair() {
        let body = json!({"rates": {"USD": 1.07}});
        let err = extract_rate(&body, Currency::Eur, Currency::Pln).unwrap_err();
        assert_eq!(err, FxError::rate_not_found("EUR", "PLN"));
    }

    #[test]
    fn test_extract_rate_malformed_body() {
        let err = extract_rate(&json!({"message": "oops"}), Currency::Eur, Currency::Usd).unwrap_err();
        assert!(matches!(err, FxError::Unavailable(_)));

        let err = extract_rate(&json!({"rates": {"USD": null}}), Currency::Eur, Currency::Usd).unwrap_err();
        assert!(matches!(err, FxError::Unavailable(_)));
    }

    #[test]
    fn test_extract_rate_scientific_notation() {
        let body = json!({"rates": {"JPY": "1.5e3"}});
        assert_eq!(extract_rate(&body, Currency::Eur, Currency::Jpy).unwrap(), dec!(1500));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_unavailable() {
        let client = FrankfurterClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = client.convert(dec!(10), Currency::Eur, Currency::Usd).await.unwrap_err();
        assert!(matches!(err, FxError::Unavailable(_)));
    }
}
