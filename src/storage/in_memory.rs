use super::traits::Storage;
use crate::common::error::{Result, RevizeError};
use crate::domain::{Project, RegistryStatusRecord, Revision, User, VvDoc};
use crate::numbering::DocumentClass;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// In-memory storage implementation for development/testing
pub struct InMemoryStorage {
    users: Arc<Mutex<BTreeMap<i64, User>>>,
    projects: Arc<Mutex<BTreeMap<i64, Project>>>,
    revisions: Arc<Mutex<BTreeMap<i64, Revision>>>,
    vv_docs: Arc<Mutex<HashMap<String, VvDoc>>>,
    next_id: AtomicI64,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            users: Arc::new(Mutex::new(BTreeMap::new())),
            projects: Arc::new(Mutex::new(BTreeMap::new())),
            revisions: Arc::new(Mutex::new(BTreeMap::new())),
            vv_docs: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicI64::new(1),
        }
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| RevizeError::Storage("in-memory storage lock poisoned".to_string()))
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn create_user(&self, user: &mut User) -> Result<()> {
        let mut users = lock(&self.users)?;
        if users.values().any(|u| u.email == user.email) {
            return Err(RevizeError::Conflict(format!(
                "user with email {} already exists",
                user.email
            )));
        }
        let id = self.allocate_id();
        user.id = Some(id);
        users.insert(id, user.clone());

        debug!("Created user: {} with id {}", user.email, id);
        Ok(())
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        Ok(lock(&self.users)?.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = lock(&self.users)?;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn update_user_registry_status(
        &self,
        user_id: i64,
        record: &RegistryStatusRecord,
    ) -> Result<()> {
        let mut users = lock(&self.users)?;
        let user = users
            .get_mut(&user_id)
            .ok_or_else(|| RevizeError::NotFound(format!("User {}", user_id)))?;
        user.registry = Some(record.clone());

        debug!("Updated registry status of user {} to {}", user_id, record.rt_status);
        Ok(())
    }

    async fn create_project(&self, project: &mut Project) -> Result<()> {
        let id = self.allocate_id();
        project.id = Some(id);
        lock(&self.projects)?.insert(id, project.clone());

        debug!("Created project: {} with id {}", project.address, id);
        Ok(())
    }

    async fn get_project(&self, id: i64) -> Result<Option<Project>> {
        Ok(lock(&self.projects)?.get(&id).cloned())
    }

    async fn list_projects_for_user(&self, user_id: i64) -> Result<Vec<Project>> {
        let projects = lock(&self.projects)?;
        Ok(projects
            .values()
            .filter(|p| p.is_accessible_by(user_id))
            .cloned()
            .collect())
    }

    async fn insert_revision(&self, revision: &mut Revision) -> Result<()> {
        let mut revisions = lock(&self.revisions)?;
        if revisions.values().any(|r| r.number == revision.number) {
            return Err(RevizeError::SequenceConflict {
                number: revision.number.clone(),
            });
        }
        let id = self.allocate_id();
        revision.id = Some(id);
        revisions.insert(id, revision.clone());

        debug!("Created revision: {} with id {}", revision.number, id);
        Ok(())
    }

    async fn get_revision(&self, id: i64) -> Result<Option<Revision>> {
        Ok(lock(&self.revisions)?.get(&id).cloned())
    }

    async fn list_revisions(&self, project_id: i64) -> Result<Vec<Revision>> {
        let revisions = lock(&self.revisions)?;
        Ok(revisions
            .values()
            .filter(|r| r.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn insert_vv_doc(&self, doc: &VvDoc) -> Result<()> {
        let mut docs = lock(&self.vv_docs)?;
        if docs.contains_key(&doc.id) {
            return Err(RevizeError::Conflict(format!("VV document {} already exists", doc.id)));
        }
        if docs.values().any(|d| d.number == doc.number) {
            return Err(RevizeError::SequenceConflict {
                number: doc.number.clone(),
            });
        }
        docs.insert(doc.id.clone(), doc.clone());

        debug!("Created VV document: {} with id {}", doc.number, doc.id);
        Ok(())
    }

    async fn get_vv_doc(&self, id: &str) -> Result<Option<VvDoc>> {
        Ok(lock(&self.vv_docs)?.get(id).cloned())
    }

    async fn update_vv_doc(&self, doc: &VvDoc) -> Result<()> {
        let mut docs = lock(&self.vv_docs)?;
        match docs.get_mut(&doc.id) {
            Some(existing) => {
                *existing = doc.clone();
                debug!("Updated VV document {}", doc.id);
                Ok(())
            }
            None => Err(RevizeError::NotFound(format!("VV document {}", doc.id))),
        }
    }

    async fn list_vv_docs(&self, project_id: i64) -> Result<Vec<VvDoc>> {
        let docs = lock(&self.vv_docs)?;
        let mut out: Vec<VvDoc> = docs
            .values()
            .filter(|d| d.project_id == project_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.number.cmp(&a.number)));
        Ok(out)
    }

    async fn delete_vv_doc(&self, id: &str) -> Result<bool> {
        let removed = lock(&self.vv_docs)?.remove(id).is_some();
        if removed {
            debug!("Deleted VV document {}", id);
        }
        Ok(removed)
    }

    async fn evidence_numbers(
        &self,
        class: DocumentClass,
        project_id: i64,
        prefix: &str,
        suffix: Option<&str>,
    ) -> Result<Vec<String>> {
        let in_scope = |number: &str| {
            number.starts_with(prefix) && suffix.map_or(true, |s| number.ends_with(s))
        };
        let numbers = match class {
            DocumentClass::Revision => lock(&self.revisions)?
                .values()
                .filter(|r| r.project_id == project_id && in_scope(&r.number))
                .map(|r| r.number.clone())
                .collect(),
            DocumentClass::VerificationProtocol => lock(&self.vv_docs)?
                .values()
                .filter(|d| d.project_id == project_id && in_scope(&d.number))
                .map(|d| d.number.clone())
                .collect(),
        };
        Ok(numbers)
    }
}
