use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::projects_use_case::ensure_project_access;
use crate::common::constants::DEFAULT_REVISION_STATUS;
use crate::common::error::{Result, RevizeError};
use crate::domain::{Project, Revision, VvDoc};
use crate::numbering::{DocumentClass, EvidenceNumberGenerator};
use crate::observability::metrics as obs;
use crate::storage::Storage;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewVvDoc {
    /// Client-chosen id; a UUID is generated when absent.
    pub id: Option<String>,
    pub project_id: i64,
    pub data_json: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VvDocUpdate {
    pub project_id: Option<i64>,
    pub data_json: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRevision {
    pub project_id: i64,
    #[serde(alias = "type")]
    pub revision_type: String,
    pub date_done: NaiveDate,
    pub valid_until: Option<NaiveDate>,
    pub status: Option<String>,
    pub data_json: Option<Value>,
}

/// Starting content of a verification protocol, as the editor expects it.
pub fn default_protocol_data(project: &Project, today: NaiveDate) -> Value {
    let name = if project.address.is_empty() {
        format!("Projekt {}", project.id.unwrap_or_default())
    } else {
        project.address.clone()
    };
    json!({
        "objectName": name,
        "address": project.address,
        "preparedBy": "",
        "date": today.format("%Y-%m-%d").to_string(),
        "committee": [{"role": "Předseda", "name": ""}],
        "spaces": [{
            "id": Uuid::new_v4().to_string(),
            "name": "Hlavní prostor",
            "note": "",
            "selections": {},
            "measures": "",
            "intervals": "",
        }],
    })
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Verification protocols and revision reports, numbered on creation.
pub struct DocumentsUseCase {
    storage: Arc<dyn Storage>,
    numbers: EvidenceNumberGenerator,
}

impl DocumentsUseCase {
    pub fn new(storage: Arc<dyn Storage>, numbers: EvidenceNumberGenerator) -> Self {
        Self { storage, numbers }
    }

    #[instrument(skip(self, new), fields(project_id = new.project_id))]
    pub async fn create_vv(&self, user_id: i64, new: NewVvDoc) -> Result<VvDoc> {
        let project = ensure_project_access(self.storage.as_ref(), new.project_id, user_id).await?;

        let id = match new.id.map(|id| id.trim().to_string()) {
            Some(id) if !id.is_empty() => id,
            _ => Uuid::new_v4().to_string(),
        };
        if self.storage.get_vv_doc(&id).await?.is_some() {
            return Err(RevizeError::Conflict(
                "Document with this ID already exists".to_string(),
            ));
        }

        let today = Utc::now().date_naive();
        let data_json = match new.data_json {
            Some(data) if !is_blank(&data) => data,
            _ => default_protocol_data(&project, today),
        };

        let storage = self.storage.clone();
        let doc = self
            .numbers
            .generate_and_assign(
                new.project_id,
                DocumentClass::VerificationProtocol,
                today,
                |number| {
                    let storage = storage.clone();
                    let now = Utc::now();
                    let doc = VvDoc {
                        id: id.clone(),
                        number: number.to_string(),
                        project_id: new.project_id,
                        data_json: data_json.clone(),
                        created_at: now,
                        updated_at: now,
                    };
                    async move {
                        storage.insert_vv_doc(&doc).await?;
                        Ok::<_, RevizeError>(doc)
                    }
                },
            )
            .await?;

        obs::documents::created(DocumentClass::VerificationProtocol.as_str());
        info!(id = %doc.id, number = %doc.number, "VV document created");
        Ok(doc)
    }

    async fn load_vv(&self, user_id: i64, id: &str) -> Result<(VvDoc, Project)> {
        let doc = self
            .storage
            .get_vv_doc(id)
            .await?
            .ok_or_else(|| RevizeError::NotFound("VV document".to_string()))?;
        let project = ensure_project_access(self.storage.as_ref(), doc.project_id, user_id).await?;
        Ok((doc, project))
    }

    pub async fn get_vv(&self, user_id: i64, id: &str) -> Result<VvDoc> {
        self.load_vv(user_id, id).await.map(|(doc, _)| doc)
    }

    pub async fn list_vv(&self, user_id: i64, project_id: i64) -> Result<Vec<VvDoc>> {
        ensure_project_access(self.storage.as_ref(), project_id, user_id).await?;
        self.storage.list_vv_docs(project_id).await
    }

    pub async fn update_vv(&self, user_id: i64, id: &str, update: VvDocUpdate) -> Result<VvDoc> {
        let (mut doc, _) = self.load_vv(user_id, id).await?;

        if let Some(project_id) = update.project_id {
            if project_id != doc.project_id {
                return Err(RevizeError::BadRequest(
                    "Changing project_id is not allowed. Create a new VV in the target project."
                        .to_string(),
                ));
            }
        }
        if let Some(data) = update.data_json {
            doc.data_json = data;
        }
        doc.updated_at = Utc::now();
        self.storage.update_vv_doc(&doc).await?;
        Ok(doc)
    }

    /// Only the project owner may delete.
    pub async fn delete_vv(&self, user_id: i64, id: &str) -> Result<()> {
        let (doc, project) = self.load_vv(user_id, id).await?;
        if project.owner_id != user_id {
            return Err(RevizeError::Forbidden("Only owner can delete".to_string()));
        }
        if !self.storage.delete_vv_doc(&doc.id).await? {
            return Err(RevizeError::NotFound("VV document".to_string()));
        }
        info!(id = %doc.id, number = %doc.number, "VV document deleted");
        Ok(())
    }

    #[instrument(skip(self, new), fields(project_id = new.project_id))]
    pub async fn create_revision(&self, user_id: i64, new: NewRevision) -> Result<Revision> {
        ensure_project_access(self.storage.as_ref(), new.project_id, user_id).await?;

        let revision_type = new.revision_type.trim().to_string();
        if revision_type.is_empty() {
            return Err(RevizeError::Validation("revision type must not be empty".to_string()));
        }
        if let Some(valid_until) = new.valid_until {
            if valid_until < new.date_done {
                return Err(RevizeError::Validation(
                    "valid_until must not precede date_done".to_string(),
                ));
            }
        }
        let status = new
            .status
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REVISION_STATUS.to_string());
        let data_json = new.data_json.unwrap_or_else(|| json!({}));

        let storage = self.storage.clone();
        let revision = self
            .numbers
            .generate_and_assign(new.project_id, DocumentClass::Revision, new.date_done, |number| {
                let storage = storage.clone();
                let mut revision = Revision {
                    id: None,
                    project_id: new.project_id,
                    number: number.to_string(),
                    revision_type: revision_type.clone(),
                    date_done: new.date_done,
                    valid_until: new.valid_until,
                    status: status.clone(),
                    data_json: data_json.clone(),
                };
                async move {
                    storage.insert_revision(&mut revision).await?;
                    Ok::<_, RevizeError>(revision)
                }
            })
            .await?;

        obs::documents::created(DocumentClass::Revision.as_str());
        info!(number = %revision.number, "Revision created");
        Ok(revision)
    }

    pub async fn get_revision(&self, user_id: i64, id: i64) -> Result<Revision> {
        let revision = self
            .storage
            .get_revision(id)
            .await?
            .ok_or_else(|| RevizeError::NotFound("Revision".to_string()))?;
        ensure_project_access(self.storage.as_ref(), revision.project_id, user_id).await?;
        Ok(revision)
    }

    pub async fn list_revisions(&self, user_id: i64, project_id: i64) -> Result<Vec<Revision>> {
        ensure_project_access(self.storage.as_ref(), project_id, user_id).await?;
        self.storage.list_revisions(project_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::projects_use_case::{NewProject, ProjectsUseCase};
    use crate::domain::{RegistryStatusRecord, User};
    use crate::storage::InMemoryStorage;
    use async_trait::async_trait;
    use chrono::Datelike;

    /// In-memory storage where another request deletes a VV document just
    /// before ours does.
    struct RacingDelete(InMemoryStorage);

    #[async_trait]
    impl Storage for RacingDelete {
        async fn create_user(&self, user: &mut User) -> Result<()> {
            self.0.create_user(user).await
        }
        async fn get_user(&self, id: i64) -> Result<Option<User>> {
            self.0.get_user(id).await
        }
        async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
            self.0.find_user_by_email(email).await
        }
        async fn update_user_registry_status(
            &self,
            user_id: i64,
            record: &RegistryStatusRecord,
        ) -> Result<()> {
            self.0.update_user_registry_status(user_id, record).await
        }
        async fn create_project(&self, project: &mut Project) -> Result<()> {
            self.0.create_project(project).await
        }
        async fn get_project(&self, id: i64) -> Result<Option<Project>> {
            self.0.get_project(id).await
        }
        async fn list_projects_for_user(&self, user_id: i64) -> Result<Vec<Project>> {
            self.0.list_projects_for_user(user_id).await
        }
        async fn insert_revision(&self, revision: &mut Revision) -> Result<()> {
            self.0.insert_revision(revision).await
        }
        async fn get_revision(&self, id: i64) -> Result<Option<Revision>> {
            self.0.get_revision(id).await
        }
        async fn list_revisions(&self, project_id: i64) -> Result<Vec<Revision>> {
            self.0.list_revisions(project_id).await
        }
        async fn insert_vv_doc(&self, doc: &VvDoc) -> Result<()> {
            self.0.insert_vv_doc(doc).await
        }
        async fn get_vv_doc(&self, id: &str) -> Result<Option<VvDoc>> {
            self.0.get_vv_doc(id).await
        }
        async fn update_vv_doc(&self, doc: &VvDoc) -> Result<()> {
            self.0.update_vv_doc(doc).await
        }
        async fn list_vv_docs(&self, project_id: i64) -> Result<Vec<VvDoc>> {
            self.0.list_vv_docs(project_id).await
        }
        async fn delete_vv_doc(&self, id: &str) -> Result<bool> {
            self.0.delete_vv_doc(id).await?;
            self.0.delete_vv_doc(id).await
        }
        async fn evidence_numbers(
            &self,
            class: DocumentClass,
            project_id: i64,
            prefix: &str,
            suffix: Option<&str>,
        ) -> Result<Vec<String>> {
            self.0.evidence_numbers(class, project_id, prefix, suffix).await
        }
    }

    const OWNER: i64 = 10;
    const COLLEAGUE: i64 = 11;
    const STRANGER: i64 = 12;

    async fn setup() -> (DocumentsUseCase, i64) {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let project = ProjectsUseCase::new(storage.clone())
            .create_project(
                OWNER,
                NewProject {
                    address: "Husova 5, Brno".into(),
                    client: "Město Brno".into(),
                    shared_with_user_ids: vec![COLLEAGUE],
                },
            )
            .await
            .unwrap();
        let numbers = EvidenceNumberGenerator::new(storage.clone(), 5);
        (DocumentsUseCase::new(storage, numbers), project.id.unwrap())
    }

    fn new_vv(project_id: i64) -> NewVvDoc {
        NewVvDoc {
            id: None,
            project_id,
            data_json: None,
        }
    }

    #[tokio::test]
    async fn vv_numbers_increase_within_project_and_year() {
        let (docs, pid) = setup().await;
        let year = Utc::now().year();

        let first = docs.create_vv(OWNER, new_vv(pid)).await.unwrap();
        let second = docs.create_vv(COLLEAGUE, new_vv(pid)).await.unwrap();

        assert_eq!(first.number, format!("VV-{}-001-{}", pid, year));
        assert_eq!(second.number, format!("VV-{}-002-{}", pid, year));
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn vv_gets_default_protocol_skeleton() {
        let (docs, pid) = setup().await;
        let doc = docs.create_vv(OWNER, new_vv(pid)).await.unwrap();

        assert_eq!(doc.data_json["objectName"], "Husova 5, Brno");
        assert_eq!(doc.data_json["committee"][0]["role"], "Předseda");
        assert_eq!(doc.data_json["spaces"][0]["name"], "Hlavní prostor");
        assert_eq!(doc.data_json["spaces"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn duplicate_vv_id_conflicts() {
        let (docs, pid) = setup().await;
        let mut new = new_vv(pid);
        new.id = Some("vv-fixed".into());
        docs.create_vv(OWNER, new.clone()).await.unwrap();

        let err = docs.create_vv(OWNER, new).await.unwrap_err();
        assert!(matches!(err, RevizeError::Conflict(_)));
    }

    #[tokio::test]
    async fn stranger_cannot_touch_documents() {
        let (docs, pid) = setup().await;
        let doc = docs.create_vv(OWNER, new_vv(pid)).await.unwrap();

        assert!(matches!(
            docs.create_vv(STRANGER, new_vv(pid)).await,
            Err(RevizeError::Forbidden(_))
        ));
        assert!(matches!(
            docs.get_vv(STRANGER, &doc.id).await,
            Err(RevizeError::Forbidden(_))
        ));
        assert!(matches!(
            docs.get_vv(OWNER, "missing").await,
            Err(RevizeError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn moving_vv_to_another_project_is_rejected() {
        let (docs, pid) = setup().await;
        let doc = docs.create_vv(OWNER, new_vv(pid)).await.unwrap();

        let err = docs
            .update_vv(
                OWNER,
                &doc.id,
                VvDocUpdate {
                    project_id: Some(pid + 1),
                    data_json: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RevizeError::BadRequest(_)));

        let updated = docs
            .update_vv(
                OWNER,
                &doc.id,
                VvDocUpdate {
                    project_id: Some(pid),
                    data_json: Some(json!({"objectName": "Sklad"})),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.number, doc.number);
        assert_eq!(updated.data_json["objectName"], "Sklad");
    }

    #[tokio::test]
    async fn only_owner_deletes() {
        let (docs, pid) = setup().await;
        let doc = docs.create_vv(OWNER, new_vv(pid)).await.unwrap();

        assert!(matches!(
            docs.delete_vv(COLLEAGUE, &doc.id).await,
            Err(RevizeError::Forbidden(_))
        ));
        docs.delete_vv(OWNER, &doc.id).await.unwrap();
        assert!(docs.list_vv(OWNER, pid).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn revisions_number_by_project_with_done_year() {
        let (docs, pid) = setup().await;
        let new = |y: i32| NewRevision {
            project_id: pid,
            revision_type: "Pravidelná".into(),
            date_done: NaiveDate::from_ymd_opt(y, 6, 1).unwrap(),
            valid_until: None,
            status: None,
            data_json: None,
        };

        let first = docs.create_revision(OWNER, new(2025)).await.unwrap();
        let second = docs.create_revision(OWNER, new(2026)).await.unwrap();

        assert_eq!(first.number, format!("RZ-{}-1-2025", pid));
        assert_eq!(second.number, format!("RZ-{}-2-2026", pid));
        assert_eq!(first.status, DEFAULT_REVISION_STATUS);
        assert_eq!(docs.list_revisions(COLLEAGUE, pid).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn revision_validity_must_follow_completion() {
        let (docs, pid) = setup().await;
        let err = docs
            .create_revision(
                OWNER,
                NewRevision {
                    project_id: pid,
                    revision_type: "Výchozí".into(),
                    date_done: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
                    valid_until: NaiveDate::from_ymd_opt(2026, 1, 1),
                    status: None,
                    data_json: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RevizeError::Validation(_)));
    }

    #[tokio::test]
    async fn delete_lost_to_a_concurrent_delete_is_not_found() {
        let storage: Arc<dyn Storage> = Arc::new(RacingDelete(InMemoryStorage::new()));
        let project = ProjectsUseCase::new(storage.clone())
            .create_project(
                OWNER,
                NewProject {
                    address: "Husova 5, Brno".into(),
                    client: String::new(),
                    shared_with_user_ids: vec![],
                },
            )
            .await
            .unwrap();
        let numbers = EvidenceNumberGenerator::new(storage.clone(), 5);
        let docs = DocumentsUseCase::new(storage, numbers);

        let doc = docs.create_vv(OWNER, new_vv(project.id.unwrap())).await.unwrap();
        let err = docs.delete_vv(OWNER, &doc.id).await.unwrap_err();
        assert!(matches!(err, RevizeError::NotFound(_)));
    }
}
