//! Provider abstraction over rule management.

use crate::error::RoutingError;
use crate::types::{CreateOutcome, DeleteOutcome};
use async_trait::async_trait;

/// Rule management operations the alias service depends on.
///
/// `EmailRoutingClient` is the production implementation; tests substitute
/// their own.
#[async_trait]
pub trait EmailRouting: Send + Sync {
    /// Create a rule forwarding `address` to `destination`.
    async fn create_rule(
        &self,
        address: &str,
        destination: &str,
    ) -> Result<CreateOutcome, RoutingError>;

    /// Remove the rule routing `address`, if one exists.
    async fn delete_rule(&self, address: &str) -> Result<DeleteOutcome, RoutingError>;
}
