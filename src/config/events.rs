//! Event intake configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Inbound event intake configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    /// HMAC secret shared with the event bus for signature verification
    pub signing_secret: String,

    /// Upper bound on users reconciled concurrently during cohort fan-out
    #[serde(default = "default_fanout_concurrency")]
    pub fanout_concurrency: usize,
}

impl EventsConfig {
    /// Validate event intake configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.signing_secret.is_empty() {
            return Err(ValidationError::MissingRequired("EVENTS_SIGNING_SECRET"));
        }
        if self.signing_secret.len() < 16 {
            return Err(ValidationError::InvalidSigningSecret);
        }
        if self.fanout_concurrency == 0 {
            return Err(ValidationError::InvalidFanoutConcurrency);
        }
        Ok(())
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            signing_secret: String::new(),
            fanout_concurrency: default_fanout_concurrency(),
        }
    }
}

fn default_fanout_concurrency() -> usize {
    5
}
