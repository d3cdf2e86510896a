//! Discord adapter - community role management.

mod discord_role_api;

pub use discord_role_api::{DiscordConfig, DiscordRoleAdapter};
