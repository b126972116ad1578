//! Stripe-compatible checkout client

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

use super::{is_valid_session_id, CheckoutSession, GatewayError, NewCheckoutSession, PaymentGateway};

#[derive(Debug, Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(
        base_url: impl Into<String>,
        secret_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }

    async fn read_session(
        &self,
        response: reqwest::Response,
        session_ref: &str,
    ) -> Result<CheckoutSession, GatewayError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(GatewayError::SessionNotFound(session_ref.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "Payment gateway returned error status");
            return Err(GatewayError::Unavailable(format!("gateway returned {}", status)));
        }

        response
            .json::<CheckoutSession>()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("invalid session payload: {}", e)))
    }
}

/// Form fields for a one-item payment-mode checkout
pub(crate) fn checkout_form(request: &NewCheckoutSession) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        (
            "success_url".to_string(),
            format!("{}?session_id={{CHECKOUT_SESSION_ID}}", request.success_url),
        ),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        (
            "line_items[0][price_data][currency]".to_string(),
            request.currency.code().to_ascii_lowercase(),
        ),
        (
            "line_items[0][price_data][unit_amount]".to_string(),
            request.amount_minor_units.to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]".to_string(),
            request.product_name.clone(),
        ),
    ];

    for (key, value) in &request.metadata {
        form.push((format!("metadata[{}]", key), value.clone()));
    }

    form
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn get_session(&self, session_id: &str) -> Result<CheckoutSession, GatewayError> {
        if !is_valid_session_id(session_id) {
            tracing::warn!(session_id, "Refusing malformed payment session id");
            return Err(GatewayError::SessionNotFound(session_id.to_string()));
        }
        let url = format!("{}/v1/checkout/sessions/{}", self.base_url, session_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, session_id, "Payment gateway request failed");
                GatewayError::Unavailable(e.to_string())
            })?;

        self.read_session(response, session_id).await
    }

    async fn create_session(&self, request: NewCheckoutSession) -> Result<CheckoutSession, GatewayError> {
        let url = format!("{}/v1/checkout/sessions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&checkout_form(&request))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Payment gateway request failed");
                GatewayError::Unavailable(e.to_string())
            })?;

        self.read_session(response, "new checkout session").await
    }
}
