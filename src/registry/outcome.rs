use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::query::QueryRejection;
use crate::common::constants::CHECKED_AT_FORMAT;

/// Result of one registry lookup; one case per status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegistryMatch {
    Verified(VerifiedHolder),
    NotFound {
        reason: NotFoundReason,
        snapshot: Snapshot,
    },
    Error {
        detail: String,
        snapshot: Snapshot,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedHolder {
    pub register_id: Option<String>,
    pub scope: Vec<String>,
    pub valid_until: Option<String>,
    pub matched: MatchedHolder,
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedHolder {
    pub full_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub certificate_number: String,
    pub authorization_number: Option<String>,
    pub scope: Vec<String>,
}

impl MatchedHolder {
    pub fn new(
        full_name: String,
        certificate_number: String,
        authorization_number: Option<String>,
        scope: Vec<String>,
    ) -> Self {
        let mut parts = full_name.split(' ').filter(|p| !p.is_empty());
        let first_name = parts.next().map(str::to_string);
        let rest: Vec<&str> = parts.collect();
        let last_name = (!rest.is_empty()).then(|| rest.join(" "));
        Self {
            full_name,
            first_name,
            last_name,
            certificate_number,
            authorization_number,
            scope,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub source: String,
    pub checked_at: String,
    /// SHA-256 of the listing page the decision was made on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_sha256: Option<String>,
}

impl Snapshot {
    pub fn now(source: &str) -> Self {
        Self {
            source: source.to_string(),
            checked_at: Utc::now().format(CHECKED_AT_FORMAT).to_string(),
            payload_sha256: None,
        }
    }

    pub fn with_payload_sha256(mut self, digest: String) -> Self {
        self.payload_sha256 = Some(digest);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotFoundReason {
    InvalidName,
    InvalidCertificate,
    NoMatch,
}

impl From<QueryRejection> for NotFoundReason {
    fn from(rejection: QueryRejection) -> Self {
        match rejection {
            QueryRejection::InvalidName => NotFoundReason::InvalidName,
            QueryRejection::InvalidCertificate => NotFoundReason::InvalidCertificate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Verified,
    NotFound,
    Error,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Verified => "verified",
            MatchStatus::NotFound => "not_found",
            MatchStatus::Error => "error",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RegistryMatch {
    pub fn not_found(reason: NotFoundReason, snapshot: Snapshot) -> Self {
        RegistryMatch::NotFound { reason, snapshot }
    }

    pub fn error(detail: impl Into<String>, snapshot: Snapshot) -> Self {
        RegistryMatch::Error {
            detail: detail.into(),
            snapshot,
        }
    }

    pub fn status(&self) -> MatchStatus {
        match self {
            RegistryMatch::Verified(_) => MatchStatus::Verified,
            RegistryMatch::NotFound { .. } => MatchStatus::NotFound,
            RegistryMatch::Error { .. } => MatchStatus::Error,
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, RegistryMatch::Verified(_))
    }

    pub fn snapshot(&self) -> &Snapshot {
        match self {
            RegistryMatch::Verified(holder) => &holder.snapshot,
            RegistryMatch::NotFound { snapshot, .. } | RegistryMatch::Error { snapshot, .. } => {
                snapshot
            }
        }
    }

    pub fn matched(&self) -> Option<&MatchedHolder> {
        match self {
            RegistryMatch::Verified(holder) => Some(&holder.matched),
            _ => None,
        }
    }

    pub fn scope(&self) -> &[String] {
        match self {
            RegistryMatch::Verified(holder) => &holder.scope,
            _ => &[],
        }
    }

    pub fn valid_until(&self) -> Option<&str> {
        match self {
            RegistryMatch::Verified(holder) => holder.valid_until.as_deref(),
            _ => None,
        }
    }

    pub fn register_id(&self) -> Option<&str> {
        match self {
            RegistryMatch::Verified(holder) => holder.register_id.as_deref(),
            _ => None,
        }
    }
}
