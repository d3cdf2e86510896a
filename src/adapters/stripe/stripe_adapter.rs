//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` trait for Stripe API integration:
//! creating amount-off coupons for the discount registry and reading
//! checkout sessions to map charges back to purchases.
//!
//! # Security
//!
//! The API key is handled via `secrecy::SecretString` and never logged.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::ports::{
    CheckoutSession, CreateDiscountRequest, PaymentError, PaymentErrorCode, PaymentProvider,
    ProviderDiscount,
};

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,
}

impl StripeConfig {
    /// Create a new Stripe configuration.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_base_url: "https://api.stripe.com".to_string(),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

/// Stripe payment provider adapter.
pub struct StripePaymentAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripePaymentAdapter {
    /// Create a new Stripe adapter with the given configuration.
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }
}

/// Stripe coupon object (the fields we read).
#[derive(Debug, Deserialize)]
struct StripeCoupon {
    id: String,
    amount_off: Option<i64>,
}

/// Stripe checkout session object (the fields we read).
#[derive(Debug, Deserialize)]
struct StripeCheckoutSession {
    id: String,
    payment_intent: Option<StripePaymentIntent>,
    amount_total: Option<i64>,
}

/// Expanded payment intent carrying the charge id.
#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    latest_charge: Option<String>,
}

fn rate_limited(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
}

#[async_trait]
impl PaymentProvider for StripePaymentAdapter {
    async fn create_discount(
        &self,
        request: CreateDiscountRequest,
    ) -> Result<ProviderDiscount, PaymentError> {
        let url = format!("{}/v1/coupons", self.config.api_base_url);

        let amount = request.amount_off_cents.to_string();
        let params = vec![
            ("amount_off", amount.as_str()),
            ("currency", "usd"),
            ("duration", "once"),
            ("name", request.name.as_str()),
            ("metadata[discount_class]", request.discount_class.as_str()),
        ];

        let response = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(&params)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(error = %error_text, "Stripe create_discount failed");
            let code = if rate_limited(status) {
                PaymentErrorCode::RateLimitExceeded
            } else if status == reqwest::StatusCode::UNAUTHORIZED {
                PaymentErrorCode::AuthenticationError
            } else {
                PaymentErrorCode::ProviderError
            };
            return Err(PaymentError::new(
                code,
                format!("Stripe API error: {}", error_text),
            ));
        }

        let coupon: StripeCoupon = response.json().await.map_err(|e| {
            PaymentError::provider(format!("Failed to parse Stripe response: {}", e))
        })?;

        Ok(ProviderDiscount {
            id: coupon.id,
            amount_off_cents: coupon.amount_off.unwrap_or(request.amount_off_cents),
        })
    }

    async fn get_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<Option<CheckoutSession>, PaymentError> {
        let url = format!(
            "{}/v1/checkout/sessions/{}?expand[]=payment_intent",
            self.config.api_base_url, session_id
        );

        let response = self
            .http_client
            .get(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(error = %error_text, "Stripe get_checkout_session failed");
            return Err(PaymentError::provider(format!(
                "Stripe API error: {}",
                error_text
            )));
        }

        let session: StripeCheckoutSession = response.json().await.map_err(|e| {
            PaymentError::provider(format!("Failed to parse Stripe response: {}", e))
        })?;

        Ok(Some(CheckoutSession {
            id: session.id,
            charge_id: session.payment_intent.and_then(|pi| pi.latest_charge),
            amount_total_cents: session.amount_total.unwrap_or(0),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_is_object_safe() {
        fn _accepts_dyn(_provider: &dyn PaymentProvider) {}
    }

    #[test]
    fn config_overrides_base_url() {
        let config = StripeConfig::new("sk_test_xxx").with_base_url("http://localhost:12111");
        assert_eq!(config.api_base_url, "http://localhost:12111");
    }

    #[test]
    fn coupon_response_parses() {
        let json = r#"{"id": "co_123", "amount_off": 5000, "currency": "usd"}"#;
        let coupon: StripeCoupon = serde_json::from_str(json).unwrap();
        assert_eq!(coupon.id, "co_123");
        assert_eq!(coupon.amount_off, Some(5000));
    }

    #[test]
    fn checkout_session_response_parses() {
        let json = r#"{
            "id": "cs_123",
            "payment_intent": {"id": "pi_1", "latest_charge": "ch_9"},
            "amount_total": 30000
        }"#;
        let session: StripeCheckoutSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.id, "cs_123");
        assert_eq!(
            session.payment_intent.and_then(|pi| pi.latest_charge),
            Some("ch_9".to_string())
        );
    }
}
