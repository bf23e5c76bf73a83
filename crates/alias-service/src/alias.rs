//! Alias request model, validation and expiry selection.

use crate::error::AliasError;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};

static PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9-]+$").unwrap());

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// Expiry phrase reported for aliases that never expire.
pub const PERMANENT: &str = "permanent";

/// Whether an alias is swept after its expiry window.
///
/// Any other value is kept as `Unrecognized` and fails validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailKind {
    Temporary,
    Permanent,
    Unrecognized(String),
}

impl<'de> Deserialize<'de> for EmailKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "temporary" => EmailKind::Temporary,
            "permanent" => EmailKind::Permanent,
            _ => EmailKind::Unrecognized(raw),
        })
    }
}

/// Body of `POST /register`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub prefix: String,
    pub target_email: String,
    pub email_type: EmailKind,
    /// Expiry selector in minutes, sent as a string or a number
    #[serde(default, deserialize_with = "selector_text")]
    pub expiry_minutes: Option<String>,
}

impl RegisterRequest {
    /// Selector to track, if this registration gets an expiry record.
    ///
    /// Only temporary aliases with a non-empty selector are tracked.
    pub fn expiry_selector(&self) -> Option<ExpirySelector> {
        match (&self.email_type, self.expiry_minutes.as_deref()) {
            (EmailKind::Temporary, Some(raw)) if !raw.trim().is_empty() => {
                Some(ExpirySelector::resolve(raw))
            }
            _ => None,
        }
    }
}

fn selector_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}

/// Check a prefix against `^[a-z0-9-]+$`.
pub fn validate_prefix(prefix: &str) -> Result<(), AliasError> {
    if PREFIX_RE.is_match(prefix) {
        Ok(())
    } else {
        Err(AliasError::InvalidPrefix)
    }
}

/// Check that a target looks like `local@domain.tld`.
pub fn validate_target_email(email: &str) -> Result<(), AliasError> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(AliasError::InvalidTargetEmail)
    }
}

/// Check that the email type is one of the supported kinds.
pub fn validate_email_kind(kind: &EmailKind) -> Result<(), AliasError> {
    match kind {
        EmailKind::Temporary | EmailKind::Permanent => Ok(()),
        EmailKind::Unrecognized(_) => Err(AliasError::InvalidEmailType),
    }
}

/// Full alias address for a prefix.
pub fn alias_address(prefix: &str, domain: &str) -> String {
    format!("{}@{}", prefix, domain)
}

/// Supported expiry windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirySelector {
    TenMinutes,
    OneHour,
    FiveHours,
    OneDay,
    OneWeek,
}

impl ExpirySelector {
    /// Parse a known minute count.
    pub fn from_minutes(raw: &str) -> Option<Self> {
        match raw.trim().parse::<u32>().ok()? {
            10 => Some(ExpirySelector::TenMinutes),
            60 => Some(ExpirySelector::OneHour),
            300 => Some(ExpirySelector::FiveHours),
            1440 => Some(ExpirySelector::OneDay),
            10080 => Some(ExpirySelector::OneWeek),
            _ => None,
        }
    }

    /// Parse a selector, falling back to one hour when unrecognized.
    pub fn resolve(raw: &str) -> Self {
        Self::from_minutes(raw).unwrap_or(ExpirySelector::OneHour)
    }

    pub fn minutes(self) -> i64 {
        match self {
            ExpirySelector::TenMinutes => 10,
            ExpirySelector::OneHour => 60,
            ExpirySelector::FiveHours => 300,
            ExpirySelector::OneDay => 1440,
            ExpirySelector::OneWeek => 10080,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::minutes(self.minutes())
    }

    /// Human-readable window reported to the caller.
    pub fn description(self) -> &'static str {
        match self {
            ExpirySelector::TenMinutes => "10 minutes",
            ExpirySelector::OneHour => "1 hour",
            ExpirySelector::FiveHours => "5 hours",
            ExpirySelector::OneDay => "24 hours",
            ExpirySelector::OneWeek => "7 days",
        }
    }
}

/// Bookkeeping entry for a temporary alias.
///
/// Stored under the alias address with the expiry instant as decimal
/// milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryRecord {
    pub address: String,
    pub expires_at_ms: i64,
}

impl ExpiryRecord {
    /// Record expiring `selector` after `now`.
    pub fn starting_at(
        address: impl Into<String>,
        selector: ExpirySelector,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            address: address.into(),
            expires_at_ms: (now + selector.duration()).timestamp_millis(),
        }
    }

    /// Parse a stored value. Non-numeric values yield `None`.
    pub fn parse(address: impl Into<String>, value: &str) -> Option<Self> {
        value.trim().parse::<i64>().ok().map(|expires_at_ms| Self {
            address: address.into(),
            expires_at_ms,
        })
    }

    /// Value written to the store.
    pub fn value(&self) -> String {
        self.expires_at_ms.to_string()
    }

    /// Whether the alias is strictly past its expiry at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at_ms < now.timestamp_millis()
    }

    /// Store-native expiration: the expiry instant plus `grace`, in whole
    /// seconds rounded down.
    pub fn store_expiration(&self, grace: Duration) -> Option<DateTime<Utc>> {
        let seconds = self.expires_at_ms.div_euclid(1000) + grace.num_seconds();
        DateTime::from_timestamp(seconds, 0)
    }
}
