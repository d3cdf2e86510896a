//! Payment provider port for discount objects and checkout lookups.
//!
//! The engine creates discount objects (the provider-side half of a
//! merchant coupon) and reads back checkout sessions when it needs the
//! charge behind a purchase. All money movement happens upstream.
//!
//! # Design
//!
//! - **Gateway agnostic**: the interface works with any payment provider
//! - **Idempotent**: discount creation is safe to retry; the registry
//!   dedups on the local mirror, not on the provider object

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::coupon::DiscountClass;
use crate::domain::foundation::DomainError;

/// Port for payment provider integrations.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Creates a discount object in the payment system.
    ///
    /// Returns the provider's identifier for the new discount. Callers
    /// mirror it locally as a merchant coupon.
    async fn create_discount(
        &self,
        request: CreateDiscountRequest,
    ) -> Result<ProviderDiscount, PaymentError>;

    /// Fetches a checkout session by provider id.
    async fn get_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<Option<CheckoutSession>, PaymentError>;
}

/// Request to create a discount object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDiscountRequest {
    /// Fixed amount off, in cents.
    pub amount_off_cents: i64,

    /// Whether this discount backs credits or promotions.
    pub discount_class: DiscountClass,

    /// Human-readable name shown in the provider dashboard.
    pub name: String,
}

/// Discount object in the payment system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDiscount {
    /// Provider's discount id.
    pub id: String,

    /// Fixed amount off, in cents.
    pub amount_off_cents: i64,
}

/// Checkout session in the payment system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider's session id.
    pub id: String,

    /// Charge created by the session, once payment completed.
    pub charge_id: Option<String>,

    /// Total charged, in cents.
    pub amount_total_cents: i64,
}

/// Error from a payment provider call.
#[derive(Debug, Clone)]
pub struct PaymentError {
    pub code: PaymentErrorCode,
    pub message: String,
}

impl PaymentError {
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    /// Creates a provider API error.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::ProviderError, message)
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str) -> Self {
        Self::new(
            PaymentErrorCode::NotFound,
            format!("{} not found", resource),
        )
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PaymentError {}

impl From<PaymentError> for DomainError {
    fn from(err: PaymentError) -> Self {
        use crate::domain::foundation::ErrorCode;

        let code = match err.code {
            PaymentErrorCode::NotFound | PaymentErrorCode::InvalidRequest => {
                ErrorCode::ValidationFailed
            }
            _ => ErrorCode::ExternalServiceError,
        };

        DomainError::new(code, err.message)
    }
}

/// Payment error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    /// Network connectivity issue.
    NetworkError,

    /// API authentication failed.
    AuthenticationError,

    /// Request rejected by the provider.
    InvalidRequest,

    /// Resource not found.
    NotFound,

    /// Rate limit exceeded.
    RateLimitExceeded,

    /// Provider API error.
    ProviderError,
}

impl PaymentErrorCode {
    /// Whether a retry of this call can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError
                | PaymentErrorCode::RateLimitExceeded
                | PaymentErrorCode::ProviderError
        )
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::AuthenticationError => "authentication_error",
            PaymentErrorCode::InvalidRequest => "invalid_request",
            PaymentErrorCode::NotFound => "not_found",
            PaymentErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            PaymentErrorCode::ProviderError => "provider_error",
        };
        write!(f, "{}", s)
    }
}
