use anyhow::Result;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::model::{Artifact, ArtifactSummary, Id};
use crate::store::traits::{ArtifactStore, RevisionConflict};

/// Process-local store. Artifacts are kept as JSON so a load always goes
/// through the same deserialization path as the database store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    artifacts: RwLock<HashMap<Id, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.artifacts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.read().is_empty()
    }
}

#[async_trait::async_trait]
impl ArtifactStore for MemoryStore {
    async fn load_artifact(&self, id: &Id) -> Result<Option<Artifact>> {
        let stored = self.artifacts.read().get(id).cloned();
        match stored {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn save_artifact(&self, artifact: &Artifact, expected_revision: Option<&str>) -> Result<()> {
        let value = serde_json::to_value(artifact)?;
        let mut artifacts = self.artifacts.write();

        let stored_revision = artifacts
            .get(&artifact.id)
            .and_then(|stored| stored.get("revision"))
            .and_then(serde_json::Value::as_str);
        let exists = artifacts.contains_key(&artifact.id);
        let matches = match expected_revision {
            Some(expected) => stored_revision == Some(expected),
            None => !exists || stored_revision.is_none(),
        };
        if !matches {
            return Err(RevisionConflict {
                artifact_id: artifact.id.clone(),
                expected: expected_revision.map(str::to_string),
            }
            .into());
        }

        artifacts.insert(artifact.id.clone(), value);
        Ok(())
    }

    async fn list_artifacts(&self) -> Result<Vec<ArtifactSummary>> {
        let stored: Vec<serde_json::Value> = self.artifacts.read().values().cloned().collect();
        let mut summaries = stored
            .into_iter()
            .map(|value| serde_json::from_value::<Artifact>(value).map(|a| a.summary()))
            .collect::<Result<Vec<_>, _>>()?;
        summaries.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(summaries)
    }

    async fn delete_artifact(&self, id: &Id) -> Result<bool> {
        Ok(self.artifacts.write().remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::TemplateCatalog;
    use crate::model::UserContext;
    use crate::seed::default_templates;

    fn artifact(name: &str) -> Artifact {
        let catalog = TemplateCatalog::new(default_templates()).unwrap();
        Artifact::new(name, catalog.root_template(), &UserContext::system())
    }

    #[tokio::test]
    async fn test_save_load_delete() {
        let store = MemoryStore::new();
        let artifact = artifact("Diabetes Screening");

        store.save_artifact(&artifact, None).await.unwrap();
        let loaded = store.load_artifact(&artifact.id).await.unwrap().unwrap();
        assert_eq!(loaded, artifact);

        let listed = store.list_artifacts().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Diabetes Screening");

        assert!(store.delete_artifact(&artifact.id).await.unwrap());
        assert!(!store.delete_artifact(&artifact.id).await.unwrap());
        assert!(store.load_artifact(&artifact.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites_expected_revision() {
        let store = MemoryStore::new();
        let mut artifact = artifact("First");
        artifact.mark_saved(&UserContext::system());
        store.save_artifact(&artifact, None).await.unwrap();
        let first_revision = artifact.revision.clone();

        artifact.name = "Renamed".to_string();
        artifact.mark_saved(&UserContext::system());
        store
            .save_artifact(&artifact, first_revision.as_deref())
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        let loaded = store.load_artifact(&artifact.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Renamed");
    }

    #[tokio::test]
    async fn test_stale_revision_rejected() {
        let store = MemoryStore::new();
        let mut artifact = artifact("Screening");
        artifact.mark_saved(&UserContext::system());
        store.save_artifact(&artifact, None).await.unwrap();

        let mut stale = artifact.clone();
        stale.description = Some("edited elsewhere".to_string());

        let err = store
            .save_artifact(&stale, Some("not-the-stored-revision"))
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<RevisionConflict>(),
            Some(&RevisionConflict {
                artifact_id: artifact.id.clone(),
                expected: Some("not-the-stored-revision".to_string()),
            })
        );

        // creating over an existing artifact is a conflict too
        assert!(store.save_artifact(&stale, None).await.is_err());
        let loaded = store.load_artifact(&artifact.id).await.unwrap().unwrap();
        assert_eq!(loaded, artifact);
    }
}
