//! Cloudflare Email Routing client for forwarding-rule management.

mod client;
mod error;
mod provider;
mod types;

pub use client::{EmailRoutingClient, DEFAULT_API_URL, DEFAULT_PRIORITY, RULES_PER_PAGE};
pub use error::RoutingError;
pub use provider::EmailRouting;
pub use types::*;
