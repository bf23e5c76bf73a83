//! Request and response types for the Email Routing rules API.

use serde::{Deserialize, Serialize};

/// Matcher type for a literal comparison against a message field.
pub const MATCHER_LITERAL: &str = "literal";

/// Action type that forwards to one or more destination addresses.
pub const ACTION_FORWARD: &str = "forward";

/// Field holding the envelope recipient.
pub const FIELD_TO: &str = "to";

/// Standard Cloudflare v4 response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ApiMessage>,
    pub result: Option<T>,
    #[serde(default)]
    pub result_info: Option<ResultInfo>,
}

impl<T> ApiEnvelope<T> {
    /// First error message reported by the API, if any.
    pub fn first_error(&self) -> Option<&str> {
        self.errors.first().map(|e| e.message.as_str())
    }
}

/// Paging details attached to list responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultInfo {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub total_count: Option<u32>,
    #[serde(default)]
    pub total_pages: Option<u32>,
}

impl ResultInfo {
    /// Whether another page follows `page`, given how many rules have been
    /// collected so far and how many the current page held.
    pub fn has_more(&self, page: u32, collected: usize, page_len: usize, per_page: u32) -> bool {
        if let Some(total_pages) = self.total_pages {
            return page < total_pages;
        }
        if let Some(total_count) = self.total_count {
            return collected < total_count as usize;
        }
        page_len >= self.per_page.unwrap_or(per_page) as usize
    }
}

/// Error or informational message inside an envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
}

/// Rule matcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Matcher {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Matcher {
    /// Literal match on the recipient address.
    pub fn literal_to(address: impl Into<String>) -> Self {
        Self {
            kind: MATCHER_LITERAL.into(),
            field: Some(FIELD_TO.into()),
            value: Some(address.into()),
        }
    }

    /// Whether this matcher is a literal recipient match on `address`.
    pub fn is_literal_to(&self, address: &str) -> bool {
        self.kind == MATCHER_LITERAL
            && self.field.as_deref() == Some(FIELD_TO)
            && self.value.as_deref() == Some(address)
    }
}

/// Rule action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: Vec<String>,
}

impl Action {
    /// Forward to a single destination.
    pub fn forward(destination: impl Into<String>) -> Self {
        Self {
            kind: ACTION_FORWARD.into(),
            value: vec![destination.into()],
        }
    }
}

/// Body of a create-rule request.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRuleRequest {
    pub matchers: Vec<Matcher>,
    pub actions: Vec<Action>,
    pub enabled: bool,
    pub priority: u32,
}

/// A routing rule as returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingRule {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub matchers: Vec<Matcher>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub priority: u32,
}

impl RoutingRule {
    /// Whether the rule's first matcher routes `address`.
    pub fn routes(&self, address: &str) -> bool {
        self.matchers
            .first()
            .map(|m| m.is_literal_to(address))
            .unwrap_or(false)
    }
}

/// Result of a create-rule call.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// The provider accepted the rule.
    Created { rule_id: Option<String> },
    /// The provider refused the rule; carries its first error message.
    Rejected(String),
}

/// Result of a delete-rule call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    Deleted { rule_id: String },
    /// No enabled rule routes the address.
    NotFound,
}
