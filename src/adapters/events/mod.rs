//! Event transport adapters.
//!
//! - `InMemoryEventBus` - capture-based publisher for tests
//! - `InboundSignatureVerifier` - HMAC verification for inbound deliveries

mod in_memory;
mod signature;

pub use in_memory::InMemoryEventBus;
pub use signature::{InboundEvent, InboundSignatureVerifier, SignatureError, SignatureHeader};
