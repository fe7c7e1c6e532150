use crate::common::error::Result;
use crate::domain::{Project, RegistryStatusRecord, Revision, User, VvDoc};
use crate::numbering::DocumentClass;
use async_trait::async_trait;

/// Persistence for users, projects and documents.
///
/// Inserting a document whose `number` is already taken fails with
/// `RevizeError::SequenceConflict`; the number generator relies on that.
#[async_trait]
pub trait Storage: Send + Sync {
    // User operations
    async fn create_user(&self, user: &mut User) -> Result<()>;
    async fn get_user(&self, id: i64) -> Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn update_user_registry_status(
        &self,
        user_id: i64,
        record: &RegistryStatusRecord,
    ) -> Result<()>;

    // Project operations
    async fn create_project(&self, project: &mut Project) -> Result<()>;
    async fn get_project(&self, id: i64) -> Result<Option<Project>>;
    /// Projects owned by or shared with `user_id`, by id.
    async fn list_projects_for_user(&self, user_id: i64) -> Result<Vec<Project>>;

    // Revision operations
    async fn insert_revision(&self, revision: &mut Revision) -> Result<()>;
    async fn get_revision(&self, id: i64) -> Result<Option<Revision>>;
    async fn list_revisions(&self, project_id: i64) -> Result<Vec<Revision>>;

    // Verification protocol operations
    async fn insert_vv_doc(&self, doc: &VvDoc) -> Result<()>;
    async fn get_vv_doc(&self, id: &str) -> Result<Option<VvDoc>>;
    async fn update_vv_doc(&self, doc: &VvDoc) -> Result<()>;
    /// Newest first.
    async fn list_vv_docs(&self, project_id: i64) -> Result<Vec<VvDoc>>;
    async fn delete_vv_doc(&self, id: &str) -> Result<bool>;

    /// Numbers of `class` documents in `project_id` that start with `prefix`
    /// and, when given, end with `suffix`.
    async fn evidence_numbers(
        &self,
        class: DocumentClass,
        project_id: i64,
        prefix: &str,
        suffix: Option<&str>,
    ) -> Result<Vec<String>>;
}
