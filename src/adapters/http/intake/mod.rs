//! Event intake HTTP module.

mod dto;
mod handlers;
mod routes;

pub use dto::IntakeResponse;
pub use handlers::{IntakeAppState, SIGNATURE_HEADER};
pub use routes::intake_router;
