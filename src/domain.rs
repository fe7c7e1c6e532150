use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Option<i64>,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub certificate_number: Option<String>,
    pub authorization_number: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub registry: Option<RegistryStatusRecord>,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: email.into(),
            is_admin: false,
            certificate_number: None,
            authorization_number: None,
            phone: None,
            address: None,
            registry: None,
        }
    }
}

/// Registry-verification fields persisted on a user after a lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryStatusRecord {
    pub rt_status: String,
    pub rt_register_id: Option<String>,
    /// Comma-joined scope codes, e.g. `E1A,E2B`.
    pub rt_scope: String,
    pub rt_valid_until: Option<String>,
    /// JSON text of the lookup snapshot.
    pub rt_source_snapshot: String,
    pub rt_last_checked_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Option<i64>,
    pub address: String,
    pub client: String,
    pub owner_id: i64,
    pub shared_with_user_ids: Vec<i64>,
}

impl Project {
    /// Owner or a user the project is shared with.
    pub fn is_accessible_by(&self, user_id: i64) -> bool {
        self.owner_id == user_id || self.shared_with_user_ids.contains(&user_id)
    }
}

/// Inspection revision report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Revision {
    pub id: Option<i64>,
    pub project_id: i64,
    pub number: String,
    pub revision_type: String,
    pub date_done: NaiveDate,
    pub valid_until: Option<NaiveDate>,
    pub status: String,
    pub data_json: serde_json::Value,
}

/// Verification protocol document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VvDoc {
    pub id: String,
    pub number: String,
    pub project_id: i64,
    pub data_json: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
