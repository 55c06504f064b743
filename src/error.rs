//! Error types for the authoring core

use crate::model::{Id, ReturnType};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthoringError {
    /// Delete or return-type-changing edit on a node referenced elsewhere
    #[error("Instance '{unique_id}' is in use: {reason}")]
    InUse { unique_id: Id, reason: String },

    #[error("Invalid modifier chain at position {position}: '{modifier_id}' does not accept '{input_type}'")]
    InvalidModifierChain {
        position: usize,
        modifier_id: Id,
        input_type: ReturnType,
    },

    #[error("Reference from '{use_id}' to '{target_id}' would create a cycle")]
    CyclicReference { use_id: Id, target_id: Id },

    #[error("Instance '{use_id}' references missing instance '{target_id}'")]
    UnresolvedReference { use_id: Id, target_id: Id },

    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The stored artifact changed after this copy was loaded
    #[error("Artifact '{0}' was changed since it was loaded")]
    StaleRevision(Id),

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(Id),

    #[error("Instance not found: {0}")]
    InstanceNotFound(Id),

    #[error("Unknown template: {0}")]
    UnknownTemplate(Id),

    #[error("Unknown modifier: {0}")]
    UnknownModifier(Id),

    #[error("Instance '{unique_id}' has no field '{field_id}'")]
    UnknownField { unique_id: Id, field_id: String },

    #[error("Field '{field_id}' cannot hold this value: {reason}")]
    InvalidFieldValue { field_id: String, reason: String },

    #[error("Invalid values for modifier '{modifier_id}': {reason}")]
    InvalidModifierValues { modifier_id: Id, reason: String },

    #[error("Instance '{unique_id}' does not belong to tree '{tree}'")]
    WrongTree { unique_id: Id, tree: String },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Catalog error: {0}")]
    Catalog(String),
}

impl AuthoringError {
    pub fn in_use(unique_id: &str, reason: impl Into<String>) -> Self {
        AuthoringError::InUse {
            unique_id: unique_id.to_string(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            AuthoringError::InUse { .. } => "in_use",
            AuthoringError::InvalidModifierChain { .. } => "invalid_modifier_chain",
            AuthoringError::CyclicReference { .. } => "cyclic_reference",
            AuthoringError::UnresolvedReference { .. } => "unresolved_reference",
            AuthoringError::Persistence(_) => "persistence",
            AuthoringError::StaleRevision(_) => "stale_revision",
            AuthoringError::ArtifactNotFound(_) => "artifact_not_found",
            AuthoringError::InstanceNotFound(_) => "instance_not_found",
            AuthoringError::UnknownTemplate(_) => "unknown_template",
            AuthoringError::UnknownModifier(_) => "unknown_modifier",
            AuthoringError::UnknownField { .. } => "unknown_field",
            AuthoringError::InvalidFieldValue { .. } => "invalid_field_value",
            AuthoringError::InvalidModifierValues { .. } => "invalid_modifier_values",
            AuthoringError::WrongTree { .. } => "wrong_tree",
            AuthoringError::InvalidOperation(_) => "invalid_operation",
            AuthoringError::Catalog(_) => "catalog",
        }
    }
}

pub type AuthoringResult<T> = Result<T, AuthoringError>;
