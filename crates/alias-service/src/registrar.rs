//! Alias registration flow.

use crate::alias::{
    alias_address, validate_email_kind, validate_prefix, validate_target_email, ExpiryRecord,
    RegisterRequest, PERMANENT,
};
use crate::error::AliasError;
use chrono::{DateTime, Duration, Utc};
use email_routing_client::{CreateOutcome, EmailRouting};
use kv_store::KvStore;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Outcome of a successful registration.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    /// Full alias address
    pub email: String,
    /// Expiry phrase reported to the caller
    pub expiry: String,
    /// Tracked expiry record, for temporary aliases
    pub record: Option<ExpiryRecord>,
}

/// Creates forwarding rules and records expiry windows.
pub struct Registrar {
    provider: Arc<dyn EmailRouting>,
    kv: Arc<dyn KvStore>,
    domain: String,
    expiration_grace: Duration,
}

impl Registrar {
    /// Create a registrar issuing aliases under `domain`.
    pub fn new(
        provider: Arc<dyn EmailRouting>,
        kv: Arc<dyn KvStore>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            kv,
            domain: domain.into(),
            expiration_grace: Duration::zero(),
        }
    }

    /// Keep expiry records in the store for `grace` past the expiry instant.
    pub fn with_expiration_grace(mut self, grace: std::time::Duration) -> Self {
        self.expiration_grace = Duration::from_std(grace).unwrap_or_else(|_| Duration::zero());
        self
    }

    /// Register an alias as of now.
    pub async fn register(&self, request: RegisterRequest) -> Result<Registration, AliasError> {
        self.register_at(request, Utc::now()).await
    }

    /// Register an alias with expiry windows measured from `now`.
    #[instrument(skip(self, request), fields(prefix = %request.prefix))]
    pub async fn register_at(
        &self,
        request: RegisterRequest,
        now: DateTime<Utc>,
    ) -> Result<Registration, AliasError> {
        validate_prefix(&request.prefix)?;
        validate_target_email(&request.target_email)?;
        validate_email_kind(&request.email_type)?;

        let email = alias_address(&request.prefix, &self.domain);
        info!(alias = %email, kind = ?request.email_type, "Registration request received");

        match self
            .provider
            .create_rule(&email, &request.target_email)
            .await?
        {
            CreateOutcome::Created { rule_id } => {
                info!(alias = %email, rule_id = ?rule_id, "Forwarding rule in place");
            }
            CreateOutcome::Rejected(reason) => {
                warn!(alias = %email, reason = %reason, "Forwarding rule rejected");
                return Err(AliasError::RuleRejected(reason));
            }
        }

        let Some(selector) = request.expiry_selector() else {
            return Ok(Registration {
                email,
                expiry: PERMANENT.to_string(),
                record: None,
            });
        };

        let record = ExpiryRecord::starting_at(email.clone(), selector, now);
        self.kv
            .put(
                &record.address,
                &record.value(),
                record.store_expiration(self.expiration_grace),
            )
            .await?;

        info!(
            alias = %email,
            expires_at_ms = record.expires_at_ms,
            "Expiry recorded"
        );

        Ok(Registration {
            email,
            expiry: selector.description().to_string(),
            record: Some(record),
        })
    }
}
