//! Entitlement Engine - reconciliation and transfer of access entitlements.
//!
//! This crate grants, converges, and transfers the entitlements that tie
//! users to purchased content, community roles, and purchase credits. It
//! consumes signed events from the platform bus and reconciles actual
//! state toward the desired state derived from purchases and coupons.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
