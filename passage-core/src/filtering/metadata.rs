//! Blocklist entries and classification results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a custom entry is matched against a target URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Hostname equals the value or is a subdomain of it
    Domain,
    /// Case-insensitive regular expression over `host + path`
    Pattern,
    /// Literal `host + path`
    Exact,
}

/// A user-managed blocklist entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlocklistEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default = "Utc::now")]
    pub added_at: DateTime<Utc>,
}

impl BlocklistEntry {
    pub fn new(kind: EntryKind, value: impl Into<String>, reason: Option<String>) -> Self {
        Self { kind, value: value.into(), reason, added_at: Utc::now() }
    }

    pub fn domain(value: impl Into<String>) -> Self {
        Self::new(EntryKind::Domain, value, None)
    }

    pub fn pattern(value: impl Into<String>) -> Self {
        Self::new(EntryKind::Pattern, value, None)
    }

    pub fn exact(value: impl Into<String>) -> Self {
        Self::new(EntryKind::Exact, value, None)
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Verdict for one target URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Allowed,
    Advertisement { domain: String },
    Malicious { domain: String },
    Blacklisted { reason: String },
}

impl Classification {
    pub fn is_blocked(&self) -> bool {
        !matches!(self, Classification::Allowed)
    }

    /// Human readable reason, `None` when allowed
    pub fn reason(&self) -> Option<String> {
        match self {
            Classification::Allowed => None,
            Classification::Advertisement { .. } => Some("Advertisement domain".to_string()),
            Classification::Malicious { .. } => Some("Malicious domain".to_string()),
            Classification::Blacklisted { reason } => Some(reason.clone()),
        }
    }
}

/// Blocklist sizes for `/api/stats`
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlocklistStats {
    pub ad_domains: usize,
    pub malicious_domains: usize,
    pub custom_entries: usize,
    pub adblock_enabled: bool,
}
