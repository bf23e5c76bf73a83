//! Cloudflare Workers KV backend over the v4 REST API.

use crate::error::KvError;
use crate::store::KvStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use urlencoding::encode;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<EnvelopeError>,
    result: Option<T>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KeyInfo {
    name: String,
}

/// Workers KV namespace client.
#[derive(Clone)]
pub struct CloudflareKv {
    client: Client,
    base_url: String,
    account_id: String,
    namespace_id: String,
    api_token: SecretString,
}

impl CloudflareKv {
    /// Create a client for one namespace.
    pub fn new(
        api_token: impl Into<String>,
        base_url: impl Into<String>,
        account_id: impl Into<String>,
        namespace_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, KvError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            account_id: account_id.into(),
            namespace_id: namespace_id.into(),
            api_token: SecretString::new(api_token.into()),
        })
    }

    fn namespace_url(&self) -> String {
        format!(
            "{}/accounts/{}/storage/kv/namespaces/{}",
            self.base_url, self.account_id, self.namespace_id
        )
    }

    fn value_url(&self, key: &str) -> String {
        format!("{}/values/{}", self.namespace_url(), encode(key))
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_token.expose_secret())
    }

    /// Turn an unsuccessful response into an API error.
    async fn api_error(response: reqwest::Response) -> KvError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Envelope<serde_json::Value>>(&body)
            .ok()
            .and_then(|e| e.errors.into_iter().next().map(|e| e.message))
            .unwrap_or(body);

        warn!(status, message = %message, "KV request failed");
        KvError::Api { status, message }
    }

    async fn expect_success(response: reqwest::Response) -> Result<(), KvError> {
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let envelope: Envelope<serde_json::Value> = response.json().await?;
        if !envelope.success {
            return Err(KvError::Api {
                status: 200,
                message: envelope
                    .errors
                    .into_iter()
                    .next()
                    .map(|e| e.message)
                    .unwrap_or_else(|| "Unknown error".into()),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for CloudflareKv {
    /// Lists keys page by page until the cursor runs out.
    #[instrument(skip(self))]
    async fn list_keys(&self) -> Result<Vec<String>, KvError> {
        let mut keys = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(format!("{}/keys", self.namespace_url()))
                .header("Authorization", self.bearer());
            if let Some(c) = &cursor {
                request = request.query(&[("cursor", c.as_str())]);
            }

            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(Self::api_error(response).await);
            }

            let envelope: Envelope<Vec<KeyInfo>> = response.json().await?;
            keys.extend(envelope.result.unwrap_or_default().into_iter().map(|k| k.name));

            cursor = envelope
                .result_info
                .and_then(|info| info.cursor)
                .filter(|c| !c.is_empty());

            if cursor.is_none() {
                break;
            }
            debug!(fetched = keys.len(), "Following KV listing cursor");
        }

        Ok(keys)
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let response = self
            .client
            .get(self.value_url(key))
            .header("Authorization", self.bearer())
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(response.text().await?)),
            _ => Err(Self::api_error(response).await),
        }
    }

    #[instrument(skip(self, value))]
    async fn put(
        &self,
        key: &str,
        value: &str,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<(), KvError> {
        let mut request = self
            .client
            .put(self.value_url(key))
            .header("Authorization", self.bearer())
            .header("Content-Type", "text/plain")
            .body(value.to_string());
        if let Some(at) = expiration {
            request = request.query(&[("expiration", at.timestamp())]);
        }

        Self::expect_success(request.send().await?).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), KvError> {
        let response = self
            .client
            .delete(self.value_url(key))
            .header("Authorization", self.bearer())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::expect_success(response).await
    }
}
