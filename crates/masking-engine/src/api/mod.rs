//! Webhook and admin HTTP surface.

mod handlers;
mod types;

pub use handlers::{create_router, ApiState};
pub use types::*;
