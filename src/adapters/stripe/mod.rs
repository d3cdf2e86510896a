//! Stripe adapter - payment provider integration.

mod stripe_adapter;

pub use stripe_adapter::{StripeConfig, StripePaymentAdapter};
