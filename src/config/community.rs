//! Community platform configuration (Discord)

use serde::Deserialize;

use super::error::ValidationError;

/// Community platform configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommunityConfig {
    /// Discord bot token used for role management
    pub discord_bot_token: String,

    /// Discord guild (server) the roles live in
    pub discord_guild_id: String,
}

impl CommunityConfig {
    /// Validate community configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.discord_bot_token.is_empty() {
            return Err(ValidationError::MissingRequired("DISCORD_BOT_TOKEN"));
        }
        if self.discord_guild_id.is_empty() {
            return Err(ValidationError::MissingRequired("DISCORD_GUILD_ID"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_missing_token() {
        let config = CommunityConfig {
            discord_guild_id: "123".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_valid_config() {
        let config = CommunityConfig {
            discord_bot_token: "bot-token".to_string(),
            discord_guild_id: "123456789".to_string(),
        };
        assert!(config.validate().is_ok());
    }
}
