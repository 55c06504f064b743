use crate::error::{AuthoringError, AuthoringResult};
use crate::logic::{ModifierRegistry, OperationOutcome, TemplateCatalog, TreeMutator, TreeOperation};
use crate::model::{Artifact, UserContext};
use crate::store::{ArtifactStore, RevisionConflict};
use log::{info, warn};
use std::sync::Arc;

/// One user's editing session on an artifact. Operations apply
/// synchronously to the in-memory copy; saving hands a snapshot to the
/// store and only adopts it once the store accepts it. The store refuses
/// the snapshot if someone else saved since this session loaded.
pub struct AuthoringSession<S: ArtifactStore> {
    store: Arc<S>,
    registry: Arc<ModifierRegistry>,
    catalog: Arc<TemplateCatalog>,
    user: UserContext,
    artifact: Artifact,
    /// Revision the store held when this session last loaded or saved
    base_revision: Option<String>,
    dirty: bool,
}

impl<S: ArtifactStore> AuthoringSession<S> {
    /// Start a session on a new, unsaved artifact
    pub fn create(
        store: Arc<S>,
        registry: Arc<ModifierRegistry>,
        catalog: Arc<TemplateCatalog>,
        name: &str,
        user: UserContext,
    ) -> Self {
        let artifact = Artifact::new(name, catalog.root_template(), &user);
        Self::from_artifact(store, registry, catalog, artifact, user)
    }

    pub fn from_artifact(
        store: Arc<S>,
        registry: Arc<ModifierRegistry>,
        catalog: Arc<TemplateCatalog>,
        artifact: Artifact,
        user: UserContext,
    ) -> Self {
        Self {
            store,
            registry,
            catalog,
            user,
            artifact,
            base_revision: None,
            dirty: true,
        }
    }

    pub async fn open(
        store: Arc<S>,
        registry: Arc<ModifierRegistry>,
        catalog: Arc<TemplateCatalog>,
        id: &str,
        user: UserContext,
    ) -> AuthoringResult<Self> {
        let artifact = store
            .load_artifact(&id.to_string())
            .await
            .map_err(|e| {
                warn!("Failed to load artifact '{}': {:#}", id, e);
                AuthoringError::Persistence(format!("{:#}", e))
            })?
            .ok_or_else(|| AuthoringError::ArtifactNotFound(id.to_string()))?;

        Ok(Self {
            store,
            registry,
            catalog,
            user,
            base_revision: artifact.revision.clone(),
            artifact,
            dirty: false,
        })
    }

    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn registry(&self) -> &ModifierRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    /// Whether there are edits the store has not accepted yet
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Apply one operation. On rejection the session state is unchanged.
    pub fn apply(&mut self, operation: &TreeOperation) -> AuthoringResult<OperationOutcome> {
        let mutator = TreeMutator::new(&self.registry, &self.catalog);
        let outcome = mutator.apply(&self.artifact, operation)?;
        self.artifact = outcome.artifact.clone();
        self.dirty = true;
        Ok(outcome)
    }

    /// Persist the current state. A failed save leaves the in-memory edits in
    /// place and reports `Persistence`, or `StaleRevision` when the stored
    /// copy moved on since this session loaded it.
    pub async fn save(&mut self) -> AuthoringResult<()> {
        let mut snapshot = self.artifact.clone();
        snapshot.mark_saved(&self.user);

        match self
            .store
            .save_artifact(&snapshot, self.base_revision.as_deref())
            .await
        {
            Ok(()) => {
                info!(
                    "Saved artifact '{}' revision {} by {}",
                    snapshot.id,
                    snapshot.revision.as_deref().unwrap_or("-"),
                    self.user.label()
                );
                self.base_revision = snapshot.revision.clone();
                self.artifact = snapshot;
                self.dirty = false;
                Ok(())
            }
            Err(e) if e.downcast_ref::<RevisionConflict>().is_some() => {
                warn!(
                    "Refused to save artifact '{}': it was saved elsewhere since it was loaded",
                    snapshot.id
                );
                Err(AuthoringError::StaleRevision(snapshot.id))
            }
            Err(e) => {
                warn!("Failed to save artifact '{}': {:#}", snapshot.id, e);
                Err(AuthoringError::Persistence(format!("{:#}", e)))
            }
        }
    }

    pub fn into_artifact(self) -> Artifact {
        self.artifact
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArtifactSummary, Id, TreeName};
    use crate::seed::{default_modifiers, default_templates};
    use crate::store::MemoryStore;

    struct FailingStore;

    #[async_trait::async_trait]
    impl ArtifactStore for FailingStore {
        async fn load_artifact(&self, _id: &Id) -> anyhow::Result<Option<Artifact>> {
            Ok(None)
        }
        async fn save_artifact(&self, _artifact: &Artifact, _expected: Option<&str>) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("connection refused"))
        }
        async fn list_artifacts(&self) -> anyhow::Result<Vec<ArtifactSummary>> {
            Ok(Vec::new())
        }
        async fn delete_artifact(&self, _id: &Id) -> anyhow::Result<bool> {
            Ok(false)
        }
    }

    fn catalogs() -> (Arc<ModifierRegistry>, Arc<TemplateCatalog>) {
        (
            Arc::new(ModifierRegistry::new(default_modifiers()).unwrap()),
            Arc::new(TemplateCatalog::new(default_templates()).unwrap()),
        )
    }

    #[tokio::test]
    async fn test_save_then_open() {
        let (registry, catalog) = catalogs();
        let store = Arc::new(MemoryStore::new());
        let mut session = AuthoringSession::create(
            store.clone(),
            registry.clone(),
            catalog.clone(),
            "Screening",
            UserContext::default_user(),
        );
        let root = session.artifact().exp_tree_include.clone();
        let outcome = session
            .apply(&TreeOperation::AddChild {
                parent_id: root,
                template_id: "GenericObservation".to_string(),
            })
            .unwrap();
        assert!(session.is_dirty());

        session.save().await.unwrap();
        assert!(!session.is_dirty());
        assert!(session.artifact().revision.is_some());

        let reopened = AuthoringSession::open(
            store,
            registry,
            catalog,
            &session.artifact().id,
            UserContext::default_user(),
        )
        .await
        .unwrap();
        assert!(reopened.artifact().instance(&outcome.created.unwrap()).is_some());
        assert_eq!(reopened.artifact(), session.artifact());
    }

    #[tokio::test]
    async fn test_failed_save_keeps_edits() {
        let (registry, catalog) = catalogs();
        let mut session = AuthoringSession::create(
            Arc::new(FailingStore),
            registry,
            catalog,
            "Screening",
            UserContext::default_user(),
        );
        let root = session.artifact().exp_tree_include.clone();
        session
            .apply(&TreeOperation::AddChild {
                parent_id: root.clone(),
                template_id: "GenericCondition".to_string(),
            })
            .unwrap();
        let before = session.artifact().clone();

        let err = session.save().await.unwrap_err();

        assert!(matches!(err, AuthoringError::Persistence(_)));
        assert!(session.is_dirty());
        assert_eq!(session.artifact(), &before);
        assert!(session.artifact().revision.is_none());
        assert_eq!(session.artifact().children(&root).len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_operation_leaves_state() {
        let (registry, catalog) = catalogs();
        let mut session = AuthoringSession::create(
            Arc::new(MemoryStore::new()),
            registry,
            catalog,
            "Screening",
            UserContext::default_user(),
        );
        let root = session.artifact().exp_tree_include.clone();
        let before = session.artifact().clone();

        let err = session
            .apply(&TreeOperation::DeleteInstance {
                tree: TreeName::ExpTreeInclude,
                unique_id: root,
            })
            .unwrap_err();

        assert!(matches!(err, AuthoringError::InvalidOperation(_)));
        assert_eq!(session.artifact(), &before);
    }

    #[tokio::test]
    async fn test_overlapping_sessions_do_not_lose_updates() {
        let (registry, catalog) = catalogs();
        let store = Arc::new(MemoryStore::new());
        let mut setup = AuthoringSession::create(
            store.clone(),
            registry.clone(),
            catalog.clone(),
            "Screening",
            UserContext::default_user(),
        );
        let definition = setup
            .apply(&TreeOperation::AddBaseElement {
                template_id: "GenericObservation".to_string(),
            })
            .unwrap()
            .created
            .unwrap();
        setup.save().await.unwrap();
        let id = setup.artifact().id.clone();

        let open = |name: &str| {
            AuthoringSession::open(
                store.clone(),
                registry.clone(),
                catalog.clone(),
                id.as_str(),
                UserContext::new(name.to_string()),
            )
        };
        let mut first = open("first").await.unwrap();
        let mut second = open("second").await.unwrap();

        let include = first.artifact().exp_tree_include.clone();
        first
            .apply(&TreeOperation::AddBaseElementUse {
                parent_id: Some(include),
                referent_id: definition.clone(),
            })
            .unwrap();
        first.save().await.unwrap();

        // still unlocked in the second session's stale copy
        second
            .apply(&TreeOperation::AddModifier {
                unique_id: definition.clone(),
                modifier_id: "BooleanExists".to_string(),
            })
            .unwrap();
        let err = second.save().await.unwrap_err();

        assert_eq!(err, AuthoringError::StaleRevision(id.clone()));
        assert!(second.is_dirty());

        let stored = store.load_artifact(&id).await.unwrap().unwrap();
        assert!(stored.is_in_use(&definition));
        assert!(stored.require(&definition).unwrap().modifiers.is_empty());

        // reopening picks up the other save and the lock that came with it
        let mut retry = open("second").await.unwrap();
        assert!(matches!(
            retry.apply(&TreeOperation::AddModifier {
                unique_id: definition,
                modifier_id: "BooleanExists".to_string(),
            }),
            Err(AuthoringError::InUse { .. })
        ));
    }

    #[tokio::test]
    async fn test_open_missing_artifact() {
        let (registry, catalog) = catalogs();
        let result = AuthoringSession::open(
            Arc::new(MemoryStore::new()),
            registry,
            catalog,
            "missing",
            UserContext::default_user(),
        )
        .await;

        assert!(matches!(result, Err(AuthoringError::ArtifactNotFound(_))));
    }
}
