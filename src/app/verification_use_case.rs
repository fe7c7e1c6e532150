use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::common::error::{Result, RevizeError};
use crate::domain::{RegistryStatusRecord, User};
use crate::registry::{RegistryMatch, RegistryMatcher};
use crate::storage::Storage;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    pub phone: Option<String>,
    pub certificate_number: Option<String>,
    pub authorization_number: Option<String>,
    pub address: Option<String>,
    /// Check the certificate against the registry right after creation.
    #[serde(default, alias = "lookup_ticr")]
    pub lookup_registry: bool,
}

/// Answer of an explicit registry check of a user.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub ok: bool,
    pub rt_status: String,
    pub rt_valid_until: Option<String>,
    #[serde(rename = "match")]
    pub outcome: RegistryMatch,
    pub checked_at: String,
}

/// The `rt_*` fields stored on a user for a lookup outcome.
pub fn registry_status_record(outcome: &RegistryMatch) -> Result<RegistryStatusRecord> {
    let snapshot = outcome.snapshot();
    Ok(RegistryStatusRecord {
        rt_status: outcome.status().as_str().to_string(),
        rt_register_id: outcome.register_id().map(str::to_string),
        rt_scope: outcome.scope().join(","),
        rt_valid_until: outcome.valid_until().map(str::to_string),
        rt_source_snapshot: serde_json::to_string(snapshot)?,
        rt_last_checked_at: snapshot.checked_at.clone(),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Admin-only user management backed by registry lookups.
pub struct VerificationUseCase {
    storage: Arc<dyn Storage>,
    matcher: RegistryMatcher,
}

impl VerificationUseCase {
    pub fn new(storage: Arc<dyn Storage>, matcher: RegistryMatcher) -> Self {
        Self { storage, matcher }
    }

    async fn ensure_admin(&self, user_id: i64) -> Result<User> {
        match self.storage.get_user(user_id).await? {
            Some(user) if user.is_admin => Ok(user),
            _ => Err(RevizeError::Forbidden("admins only".to_string())),
        }
    }

    #[instrument(skip(self))]
    pub async fn verify_user(&self, admin_id: i64, user_id: i64) -> Result<VerificationReport> {
        self.ensure_admin(admin_id).await?;
        let target = self
            .storage
            .get_user(user_id)
            .await?
            .ok_or_else(|| RevizeError::NotFound("User".to_string()))?;

        let name = target.name.trim();
        let certificate = target.certificate_number.as_deref().map(str::trim).unwrap_or("");
        if name.is_empty() || certificate.is_empty() {
            return Err(RevizeError::Validation(
                "user needs a name and a certificate number".to_string(),
            ));
        }

        let outcome = self.matcher.verify(name, certificate).await;
        let record = registry_status_record(&outcome)?;
        self.storage
            .update_user_registry_status(user_id, &record)
            .await?;
        info!(user_id, status = %record.rt_status, "Registry status stored");

        Ok(VerificationReport {
            ok: outcome.is_verified(),
            rt_status: record.rt_status,
            rt_valid_until: record.rt_valid_until,
            checked_at: record.rt_last_checked_at,
            outcome,
        })
    }

    /// Create a user; an optional registry lookup never fails the creation.
    #[instrument(skip(self, new), fields(email = %new.email))]
    pub async fn create_user(&self, admin_id: i64, new: NewUser) -> Result<User> {
        self.ensure_admin(admin_id).await?;
        self.insert_user(new).await
    }

    /// First administrator of an empty installation; no caller check.
    pub async fn bootstrap_admin(&self, name: &str, email: &str) -> Result<User> {
        self.insert_user(NewUser {
            name: name.to_string(),
            email: email.to_string(),
            is_admin: true,
            ..NewUser::default()
        })
        .await
    }

    async fn insert_user(&self, new: NewUser) -> Result<User> {
        let name = new.name.trim().to_string();
        let email = new.email.trim().to_string();
        if name.is_empty() {
            return Err(RevizeError::Validation("name must not be empty".to_string()));
        }
        if !email.contains('@') {
            return Err(RevizeError::Validation(format!("invalid email '{}'", email)));
        }
        if self.storage.find_user_by_email(&email).await?.is_some() {
            return Err(RevizeError::Conflict(format!(
                "user with email {} already exists",
                email
            )));
        }

        let mut user = User::new(name, email);
        user.is_admin = new.is_admin;
        user.phone = non_blank(new.phone);
        user.certificate_number = non_blank(new.certificate_number);
        user.authorization_number = non_blank(new.authorization_number);
        user.address = non_blank(new.address);
        self.storage.create_user(&mut user).await?;
        info!(user_id = ?user.id, "User created");

        if new.lookup_registry {
            if let (Some(id), Some(certificate)) = (user.id, user.certificate_number.clone()) {
                let outcome = self.matcher.verify(&user.name, &certificate).await;
                let stored = match registry_status_record(&outcome) {
                    Ok(record) => self
                        .storage
                        .update_user_registry_status(id, &record)
                        .await
                        .map(|_| record),
                    Err(e) => Err(e),
                };
                match stored {
                    Ok(record) => user.registry = Some(record),
                    Err(e) => warn!(user_id = id, error = %e, "Registry status not stored"),
                }
            }
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::FetchError;
    use crate::config::MatchStrategy;
    use crate::registry::matcher::tests::{CountingHttp, LISTING};
    use crate::storage::InMemoryStorage;

    async fn setup(http: Arc<CountingHttp>) -> (VerificationUseCase, Arc<InMemoryStorage>, i64) {
        let storage = Arc::new(InMemoryStorage::new());
        let mut admin = User::new("Admin Adminová", "admin@example.cz");
        admin.is_admin = true;
        storage.create_user(&mut admin).await.unwrap();

        let matcher = RegistryMatcher::new(http, "https://registry.test/rt.html", MatchStrategy::FullText);
        (
            VerificationUseCase::new(storage.clone(), matcher),
            storage,
            admin.id.unwrap(),
        )
    }

    fn technician(email: &str, certificate: Option<&str>, lookup: bool) -> NewUser {
        NewUser {
            name: "Jan Novák".into(),
            email: email.into(),
            certificate_number: certificate.map(str::to_string),
            lookup_registry: lookup,
            ..NewUser::default()
        }
    }

    #[tokio::test]
    async fn verify_persists_registry_fields() {
        let (use_case, storage, admin) = setup(CountingHttp::page(LISTING)).await;
        let user = use_case
            .create_user(admin, technician("jan@example.cz", Some("123456/E1A,E2B"), false))
            .await
            .unwrap();
        let uid = user.id.unwrap();

        let report = use_case.verify_user(admin, uid).await.unwrap();
        assert!(report.ok);
        assert_eq!(report.rt_status, "verified");
        assert_eq!(report.rt_valid_until.as_deref(), Some("31.12.2027"));

        let stored = storage.get_user(uid).await.unwrap().unwrap().registry.unwrap();
        assert_eq!(stored.rt_scope, "E1A,E2B");
        assert_eq!(stored.rt_last_checked_at, report.checked_at);
        let snapshot: serde_json::Value = serde_json::from_str(&stored.rt_source_snapshot).unwrap();
        assert_eq!(snapshot["source"], "ticr-test");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["match"]["status"], "verified");
    }

    #[tokio::test]
    async fn verify_requires_certificate() {
        let http = CountingHttp::page(LISTING);
        let (use_case, _, admin) = setup(http.clone()).await;
        let user = use_case
            .create_user(admin, technician("jan@example.cz", None, false))
            .await
            .unwrap();

        let err = use_case.verify_user(admin, user.id.unwrap()).await.unwrap_err();
        assert!(matches!(err, RevizeError::Validation(_)));
        assert_eq!(http.calls(), 0);
    }

    #[tokio::test]
    async fn non_admin_is_forbidden() {
        let (use_case, storage, _) = setup(CountingHttp::page(LISTING)).await;
        let mut plain = User::new("Petr Běžný", "petr@example.cz");
        storage.create_user(&mut plain).await.unwrap();

        let err = use_case
            .create_user(plain.id.unwrap(), technician("x@example.cz", None, false))
            .await
            .unwrap_err();
        assert!(matches!(err, RevizeError::Forbidden(_)));
    }

    #[tokio::test]
    async fn failed_lookup_does_not_block_creation() {
        let http = CountingHttp::failing(FetchError::Timeout);
        let (use_case, _, admin) = setup(http.clone()).await;

        let user = use_case
            .create_user(admin, technician("jan@example.cz", Some("123456/E1A"), true))
            .await
            .unwrap();
        assert_eq!(http.calls(), 1);
        assert_eq!(user.registry.map(|r| r.rt_status).as_deref(), Some("error"));
    }

    #[tokio::test]
    async fn bootstrap_creates_a_working_admin() {
        let (use_case, _, _) = setup(CountingHttp::page(LISTING)).await;
        let admin = use_case
            .bootstrap_admin("Eva Správcová", "eva@example.cz")
            .await
            .unwrap();
        assert!(admin.is_admin);

        let created = use_case
            .create_user(admin.id.unwrap(), technician("jan@example.cz", None, false))
            .await
            .unwrap();
        assert!(!created.is_admin);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let (use_case, _, admin) = setup(CountingHttp::page(LISTING)).await;
        let err = use_case
            .create_user(admin, technician("admin@example.cz", None, false))
            .await
            .unwrap_err();
        assert!(matches!(err, RevizeError::Conflict(_)));
    }
}
