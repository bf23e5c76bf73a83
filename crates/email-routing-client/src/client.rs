//! Cloudflare Email Routing HTTP client.

use crate::error::RoutingError;
use crate::provider::EmailRouting;
use crate::types::*;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Default Cloudflare v4 API base URL.
pub const DEFAULT_API_URL: &str = "https://api.cloudflare.com/client/v4";

/// Priority given to newly created rules.
pub const DEFAULT_PRIORITY: u32 = 10;

/// Rules requested per listing page.
pub const RULES_PER_PAGE: u32 = 50;

const UNKNOWN_ERROR: &str = "Unknown error";

/// Email Routing rules client scoped to one zone.
///
/// The API token is stored using `SecretString` to prevent accidental
/// exposure in logs or debug output.
#[derive(Clone)]
pub struct EmailRoutingClient {
    client: Client,
    base_url: String,
    zone_id: String,
    api_token: SecretString,
    priority: u32,
}

impl EmailRoutingClient {
    /// Create a new client.
    pub fn new(
        api_token: impl Into<String>,
        base_url: impl Into<String>,
        zone_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RoutingError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            zone_id: zone_id.into(),
            api_token: SecretString::new(api_token.into()),
            priority: DEFAULT_PRIORITY,
        })
    }

    /// Override the priority used for new rules.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    fn rules_url(&self) -> String {
        format!("{}/zones/{}/email/routing/rules", self.base_url, self.zone_id)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_token.expose_secret())
    }

    /// Create a rule forwarding `address` to `destination`.
    #[instrument(skip(self))]
    pub async fn create_rule(
        &self,
        address: &str,
        destination: &str,
    ) -> Result<CreateOutcome, RoutingError> {
        let request = CreateRuleRequest {
            matchers: vec![Matcher::literal_to(address)],
            actions: vec![Action::forward(destination)],
            enabled: true,
            priority: self.priority,
        };

        let response = self
            .client
            .post(self.rules_url())
            .header("Authorization", self.bearer())
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let (status, envelope) = self.read_envelope::<RoutingRule>(response).await?;

        if envelope.success {
            let rule_id = envelope.result.and_then(|r| r.id);
            info!(rule_id = ?rule_id, "Forwarding rule created");
            return Ok(CreateOutcome::Created { rule_id });
        }

        let reason = envelope.first_error().unwrap_or(UNKNOWN_ERROR).to_string();
        warn!(status, reason = %reason, "Provider rejected forwarding rule");
        Ok(CreateOutcome::Rejected(reason))
    }

    /// List every enabled rule in the order the provider returns them.
    ///
    /// Follows `result_info` across pages until the listing is exhausted.
    #[instrument(skip(self))]
    pub async fn list_rules(&self) -> Result<Vec<RoutingRule>, RoutingError> {
        let mut rules = Vec::new();
        let mut page = 1u32;

        loop {
            let response = self
                .client
                .get(self.rules_url())
                .query(&[
                    ("enabled", "true".to_string()),
                    ("page", page.to_string()),
                    ("per_page", RULES_PER_PAGE.to_string()),
                ])
                .header("Authorization", self.bearer())
                .send()
                .await?;

            let (status, envelope) = self.read_envelope::<Vec<RoutingRule>>(response).await?;

            if !envelope.success {
                return Err(RoutingError::Api {
                    status,
                    message: envelope.first_error().unwrap_or(UNKNOWN_ERROR).to_string(),
                });
            }

            let batch = envelope.result.unwrap_or_default();
            let page_len = batch.len();
            rules.extend(batch);

            let info = envelope.result_info.unwrap_or_default();
            if page_len == 0 || !info.has_more(page, rules.len(), page_len, RULES_PER_PAGE) {
                break;
            }

            page += 1;
            debug!(page, fetched = rules.len(), "Following rule listing to next page");
        }

        Ok(rules)
    }

    /// Delete the first enabled rule routing `address`.
    ///
    /// Absence of a matching rule is reported as `DeleteOutcome::NotFound`.
    #[instrument(skip(self))]
    pub async fn delete_rule(&self, address: &str) -> Result<DeleteOutcome, RoutingError> {
        let rules = self.list_rules().await?;

        let Some(rule_id) = rules
            .into_iter()
            .find(|r| r.routes(address))
            .and_then(|r| r.id)
        else {
            debug!("No forwarding rule matches address");
            return Ok(DeleteOutcome::NotFound);
        };

        let response = self
            .client
            .delete(format!("{}/{}", self.rules_url(), rule_id))
            .header("Authorization", self.bearer())
            .send()
            .await?;

        let (status, envelope) = self.read_envelope::<serde_json::Value>(response).await?;

        if !envelope.success {
            return Err(RoutingError::Api {
                status,
                message: envelope.first_error().unwrap_or(UNKNOWN_ERROR).to_string(),
            });
        }

        info!(rule_id = %rule_id, "Forwarding rule deleted");
        Ok(DeleteOutcome::Deleted { rule_id })
    }

    /// Parse a response body as an API envelope regardless of HTTP status.
    ///
    /// Cloudflare reports rejections with a 4xx status and a regular
    /// envelope, so the envelope is authoritative whenever it parses.
    async fn read_envelope<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<(u16, ApiEnvelope<T>), RoutingError> {
        let status = response.status();
        let body = response.text().await?;
        debug!(
            status = %status,
            "Response body: {}",
            body.chars().take(200).collect::<String>()
        );

        match serde_json::from_str::<ApiEnvelope<T>>(&body) {
            Ok(envelope) => Ok((status.as_u16(), envelope)),
            Err(_) if !status.is_success() => Err(RoutingError::Api {
                status: status.as_u16(),
                message: body,
            }),
            Err(e) => Err(RoutingError::Json(e)),
        }
    }
}

#[async_trait]
impl EmailRouting for EmailRoutingClient {
    async fn create_rule(
        &self,
        address: &str,
        destination: &str,
    ) -> Result<CreateOutcome, RoutingError> {
        EmailRoutingClient::create_rule(self, address, destination).await
    }

    async fn delete_rule(&self, address: &str) -> Result<DeleteOutcome, RoutingError> {
        EmailRoutingClient::delete_rule(self, address).await
    }
}
