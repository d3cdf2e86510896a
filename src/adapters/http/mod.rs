//! HTTP adapters - the inbound event intake surface.

pub mod intake;

pub use intake::{intake_router, IntakeAppState, IntakeResponse, SIGNATURE_HEADER};
