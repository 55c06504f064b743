use crate::model::{Artifact, ArtifactSummary, Id};
use anyhow::Result;
use thiserror::Error;

/// The stored revision is not the one the caller started from
#[derive(Error, Debug, Clone, PartialEq)]
#[error("artifact '{artifact_id}' no longer has revision {expected:?}")]
pub struct RevisionConflict {
    pub artifact_id: Id,
    pub expected: Option<String>,
}

/// Persistence collaborator for artifacts
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn load_artifact(&self, id: &Id) -> Result<Option<Artifact>>;
    /// Write `artifact` only if the stored copy still carries
    /// `expected_revision` (`None` for an artifact not stored yet). A
    /// mismatch fails with a [`RevisionConflict`].
    async fn save_artifact(&self, artifact: &Artifact, expected_revision: Option<&str>) -> Result<()>;
    async fn list_artifacts(&self) -> Result<Vec<ArtifactSummary>>;
    async fn delete_artifact(&self, id: &Id) -> Result<bool>;
}
