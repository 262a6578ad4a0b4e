//! Message routing and number lifecycle engine.
//!
//! Masks phone-number identities between sitters and their clients: every
//! inbound SMS is matched against the sitter directory, forwarded through a
//! pool-drawn masking number, and logged for fallback redelivery. Two
//! background workers reclaim idle numbers and re-send stuck messages.

pub mod api;
mod audit;
mod config;
mod directory;
mod error;
mod format;
mod messages;
pub mod phone;
mod pool;
mod retrier;
mod routing;
mod sweeper;
mod types;

pub use audit::{events, AuditLog};
pub use config::MaskingConfig;
pub use directory::PartyDirectory;
pub use error::MaskingError;
pub use format::{format_display_name, MarkerPolicy};
pub use messages::MessageLog;
pub use pool::NumberPool;
pub use retrier::{spawn_retrier, FallbackRetrier};
pub use routing::RoutingEngine;
pub use sweeper::{spawn_sweeper, TtlSweeper};
pub use types::*;
