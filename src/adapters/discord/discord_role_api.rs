//! Discord community role adapter.
//!
//! Implements `CommunityRoleApi` against the Discord guild-member role
//! endpoints. Both operations are idempotent on Discord's side: adding a
//! role a member already holds, or removing one they lack, succeeds.
//!
//! # Security
//!
//! The bot token is handled via `secrecy::SecretString` and never logged.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::CommunityRoleApi;

/// Discord API configuration.
#[derive(Clone)]
pub struct DiscordConfig {
    /// Bot token with `Manage Roles` permission in the guild.
    bot_token: SecretString,

    /// Guild (server) the roles live in.
    guild_id: String,

    /// Base URL for the Discord API (default: https://discord.com/api/v10).
    api_base_url: String,
}

impl DiscordConfig {
    /// Create a new Discord configuration.
    pub fn new(bot_token: impl Into<String>, guild_id: impl Into<String>) -> Self {
        Self {
            bot_token: SecretString::new(bot_token.into()),
            guild_id: guild_id.into(),
            api_base_url: "https://discord.com/api/v10".to_string(),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

/// Discord implementation of the CommunityRoleApi port.
pub struct DiscordRoleAdapter {
    config: DiscordConfig,
    http_client: reqwest::Client,
}

impl DiscordRoleAdapter {
    pub fn new(config: DiscordConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn role_url(&self, user_id: &UserId, role_id: &str) -> String {
        format!(
            "{}/guilds/{}/members/{}/roles/{}",
            self.config.api_base_url, self.config.guild_id, user_id, role_id
        )
    }

    async fn send_role_request(
        &self,
        method: reqwest::Method,
        user_id: &UserId,
        role_id: &str,
        action: &str,
    ) -> Result<(), DomainError> {
        let response = self
            .http_client
            .request(method, self.role_url(user_id, role_id))
            .header(
                "Authorization",
                format!("Bot {}", self.config.bot_token.expose_secret()),
            )
            .send()
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::ExternalServiceError,
                    format!("Discord request failed: {}", e),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(
                %user_id,
                role_id,
                status = %status,
                error = %error_text,
                "Discord role {action} failed"
            );
            return Err(DomainError::new(
                ErrorCode::ExternalServiceError,
                format!("Discord role {} failed with status {}", action, status),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CommunityRoleApi for DiscordRoleAdapter {
    async fn grant_role(&self, user_id: &UserId, role_id: &str) -> Result<(), DomainError> {
        self.send_role_request(reqwest::Method::PUT, user_id, role_id, "grant")
            .await
    }

    async fn revoke_role(&self, user_id: &UserId, role_id: &str) -> Result<(), DomainError> {
        self.send_role_request(reqwest::Method::DELETE, user_id, role_id, "revoke")
            .await
    }
}
