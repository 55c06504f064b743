use crate::error::{AuthoringError, AuthoringResult};
use crate::logic::{
    DivergenceWarning, ModifierCompatibility, ModifierMenu, ModifierRegistry, OtherInstance,
    ReferenceEngine, RootPhrase, TypeResolver,
};
use crate::model::{Artifact, Id, ReturnType, TreeName};
use serde::{Deserialize, Serialize};

/// Everything derived about one node, computed fresh from the artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceView {
    pub unique_id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree: Option<TreeName>,
    pub return_type: ReturnType,
    pub chain_types: Vec<ReturnType>,
    pub used_by: Vec<Id>,
    pub menu: ModifierMenu,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_element: Option<BaseElementView>,
    pub other_instances: Vec<OtherInstance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseElementView {
    pub referent_id: Id,
    pub display_name: String,
    /// Absent when the reference chain is broken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<RootPhrase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<DivergenceWarning>,
}

impl InstanceView {
    pub fn build(artifact: &Artifact, registry: &ModifierRegistry, unique_id: &str) -> AuthoringResult<Self> {
        let node = artifact.require(unique_id)?;

        let base_element = match node.base_element_reference() {
            Some(referent_id) => {
                let root = match ReferenceEngine::root_phrase_and_type(artifact, unique_id) {
                    Ok(root) => Some(root),
                    Err(AuthoringError::UnresolvedReference { .. }) => None,
                    Err(e) => return Err(e),
                };
                Some(BaseElementView {
                    referent_id: referent_id.clone(),
                    display_name: ReferenceEngine::display_name(artifact, unique_id)?,
                    root,
                    warning: ReferenceEngine::divergence_warning(artifact, unique_id)?,
                })
            }
            None => None,
        };

        Ok(InstanceView {
            unique_id: node.unique_id.clone(),
            name: node.display_name(),
            tree: artifact.tree_of(unique_id),
            return_type: TypeResolver::effective_type(artifact, node),
            chain_types: TypeResolver::chain_types(&node.modifiers),
            used_by: artifact.used_by(unique_id),
            menu: ModifierCompatibility::addable_modifiers(artifact, registry, unique_id)?,
            base_element,
            other_instances: TypeResolver::other_instances(artifact, unique_id),
        })
    }
}
