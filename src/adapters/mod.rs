//! Adapters layer - concrete implementations of the ports.
//!
//! # Module Organization
//!
//! - `postgres` - sqlx-backed persistence adapters
//! - `stripe` - payment provider (discount minting, checkout lookup)
//! - `discord` - community role management
//! - `events` - inbound signature verification and the in-memory bus
//! - `http` - axum event intake surface
//! - `memory` - in-memory adapters shared across tests

pub mod discord;
pub mod events;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod stripe;
