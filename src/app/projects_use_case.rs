use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::common::error::{Result, RevizeError};
use crate::domain::Project;
use crate::storage::Storage;

#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub address: String,
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub shared_with_user_ids: Vec<i64>,
}

/// Load a project the user owns or has been given access to.
pub(crate) async fn ensure_project_access(
    storage: &dyn Storage,
    project_id: i64,
    user_id: i64,
) -> Result<Project> {
    let project = storage
        .get_project(project_id)
        .await?
        .ok_or_else(|| RevizeError::NotFound("Project".to_string()))?;
    if !project.is_accessible_by(user_id) {
        return Err(RevizeError::Forbidden(format!(
            "no access to project {}",
            project_id
        )));
    }
    Ok(project)
}

pub struct ProjectsUseCase {
    storage: Arc<dyn Storage>,
}

impl ProjectsUseCase {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn create_project(&self, owner_id: i64, new: NewProject) -> Result<Project> {
        let address = new.address.trim().to_string();
        if address.is_empty() {
            return Err(RevizeError::Validation("address must not be empty".to_string()));
        }
        let mut shared = new.shared_with_user_ids;
        shared.retain(|id| *id != owner_id);
        shared.sort_unstable();
        shared.dedup();

        let mut project = Project {
            id: None,
            address,
            client: new.client.trim().to_string(),
            owner_id,
            shared_with_user_ids: shared,
        };
        self.storage.create_project(&mut project).await?;
        info!(project_id = ?project.id, owner_id, "Project created");
        Ok(project)
    }

    pub async fn get_project(&self, user_id: i64, project_id: i64) -> Result<Project> {
        ensure_project_access(self.storage.as_ref(), project_id, user_id).await
    }

    pub async fn list_projects(&self, user_id: i64) -> Result<Vec<Project>> {
        self.storage.list_projects_for_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;

    fn new_project(address: &str, shared: Vec<i64>) -> NewProject {
        NewProject {
            address: address.to_string(),
            client: "SVJ Dlouhá".to_string(),
            shared_with_user_ids: shared,
        }
    }

    #[tokio::test]
    async fn owner_and_shared_users_have_access() {
        let use_case = ProjectsUseCase::new(Arc::new(InMemoryStorage::new()));
        let project = use_case
            .create_project(1, new_project("Dlouhá 12", vec![2, 2, 1]))
            .await
            .unwrap();
        assert_eq!(project.shared_with_user_ids, vec![2]);

        let pid = project.id.unwrap();
        assert!(use_case.get_project(1, pid).await.is_ok());
        assert!(use_case.get_project(2, pid).await.is_ok());
        assert!(matches!(
            use_case.get_project(3, pid).await,
            Err(RevizeError::Forbidden(_))
        ));
        assert!(matches!(
            use_case.get_project(1, pid + 100).await,
            Err(RevizeError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn blank_address_is_rejected() {
        let use_case = ProjectsUseCase::new(Arc::new(InMemoryStorage::new()));
        let err = use_case
            .create_project(1, new_project("   ", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, RevizeError::Validation(_)));
    }
}
