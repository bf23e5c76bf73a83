//! Configuration for the alias service.

use anyhow::{bail, Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;

/// Service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Email Routing API configuration
    pub routing: RoutingConfig,

    /// Expiry side-store configuration
    #[serde(default)]
    pub kv: KvConfig,

    /// Expiry sweep configuration
    #[serde(default)]
    pub sweep: SweepConfig,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    /// Cloudflare v4 API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Zone owning the alias domain
    pub zone_id: String,

    /// Bearer token with Email Routing edit permission
    pub api_token: SecretString,

    /// Domain aliases are created under
    pub domain: String,

    /// Priority given to new forwarding rules
    #[serde(default = "default_priority")]
    pub priority: u32,

    /// Outbound request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

/// Which key-value backend holds expiry records.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KvBackend {
    #[default]
    Memory,
    Cloudflare,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KvConfig {
    #[serde(default)]
    pub backend: KvBackend,

    /// Workers KV API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Account owning the namespace
    pub account_id: Option<String>,

    /// Namespace holding expiry records
    pub namespace_id: Option<String>,

    /// Token for Workers KV; falls back to the routing token
    pub api_token: Option<SecretString>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweepConfig {
    /// Run the expiry sweep in the background
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Interval between sweep passes
    #[serde(default = "default_sweep_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// How long past an alias's expiry the store keeps its record.
    /// Raised to at least `SWEEP_RETRY_PASSES` intervals, see `record_grace`.
    #[serde(default = "default_expiration_grace", with = "humantime_serde")]
    pub expiration_grace: Duration,
}

/// Sweep passes a due record must stay visible for: the pass that first
/// sees it plus retries after a failed provider delete.
pub const SWEEP_RETRY_PASSES: u32 = 3;

impl SweepConfig {
    /// Grace applied to store-native expiration.
    ///
    /// Never shorter than `SWEEP_RETRY_PASSES` sweep intervals, so a record
    /// whose rule delete failed is still in the store on the next pass.
    pub fn record_grace(&self) -> Duration {
        self.expiration_grace
            .max(self.interval.saturating_mul(SWEEP_RETRY_PASSES))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            backend: KvBackend::default(),
            api_url: default_api_url(),
            account_id: None,
            namespace_id: None,
            api_token: None,
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: default_sweep_interval(),
            expiration_grace: default_expiration_grace(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_api_url() -> String {
    email_routing_client::DEFAULT_API_URL.into()
}

fn default_priority() -> u32 {
    email_routing_client::DEFAULT_PRIORITY
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_true() -> bool {
    true
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_expiration_grace() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_listen_addr() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8787
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Sections are separated by `__`, e.g. `ROUTING__ZONE_ID`.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sweep.enabled && self.sweep.interval.is_zero() {
            bail!("SWEEP__INTERVAL must be greater than zero");
        }
        Ok(())
    }
}
