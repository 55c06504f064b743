use crate::error::{AuthoringError, AuthoringResult};
use crate::model::{AppliedModifier, Artifact, Id, InstanceKind, ReturnType, TemplateInstance};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Entry in the "other instances" picker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtherInstance {
    pub unique_id: Id,
    pub name: String,
    pub template_id: Id,
    pub return_type: ReturnType,
}

/// Derives return types from tree state. Nothing is cached, every call
/// reads the artifact as it is now.
pub struct TypeResolver;

impl TypeResolver {
    /// Type after applying `chain` to `base`
    pub fn fold_chain(base: &str, chain: &[AppliedModifier]) -> ReturnType {
        chain
            .iter()
            .fold(base.to_string(), |_, modifier| modifier.return_type.clone())
    }

    /// Type after each modifier of the chain, in order
    pub fn chain_types(chain: &[AppliedModifier]) -> Vec<ReturnType> {
        chain.iter().map(|m| m.return_type.clone()).collect()
    }

    /// Check that every modifier consumes the type produced before it
    pub fn validate_chain(base: &str, chain: &[AppliedModifier]) -> AuthoringResult<()> {
        let mut current = base.to_string();
        for (position, modifier) in chain.iter().enumerate() {
            if !modifier.accepts(&current) {
                return Err(AuthoringError::InvalidModifierChain {
                    position,
                    modifier_id: modifier.id.clone(),
                    input_type: current,
                });
            }
            current = modifier.return_type.clone();
        }
        Ok(())
    }

    /// Type of the node before its own modifiers are applied
    pub fn intrinsic_return_type(artifact: &Artifact, node: &TemplateInstance) -> ReturnType {
        let mut visiting = HashSet::new();
        Self::intrinsic(artifact, node, &mut visiting)
    }

    /// Effective return type of a node: intrinsic type folded over its chain
    pub fn resolve_return_type(artifact: &Artifact, unique_id: &str) -> AuthoringResult<ReturnType> {
        let node = artifact.require(unique_id)?;
        Ok(Self::effective_type(artifact, node))
    }

    pub fn effective_type(artifact: &Artifact, node: &TemplateInstance) -> ReturnType {
        let mut visiting = HashSet::new();
        Self::effective(artifact, node, &mut visiting)
    }

    fn effective(artifact: &Artifact, node: &TemplateInstance, visiting: &mut HashSet<Id>) -> ReturnType {
        let base = Self::intrinsic(artifact, node, visiting);
        Self::fold_chain(&base, &node.modifiers)
    }

    fn intrinsic(artifact: &Artifact, node: &TemplateInstance, visiting: &mut HashSet<Id>) -> ReturnType {
        if !visiting.insert(node.unique_id.clone()) {
            return node.base_return_type.clone();
        }

        let resolved = if let Some(referent_id) = node.base_element_reference() {
            // dangling references keep the type captured when the use was made
            match artifact.instance(referent_id) {
                Some(referent) => Self::effective(artifact, referent, visiting),
                None => node.base_return_type.clone(),
            }
        } else if node.kind == InstanceKind::ListGroup && node.infer_return_type {
            Self::common_child_type(artifact, node, visiting)
                .unwrap_or_else(|| node.base_return_type.clone())
        } else {
            node.base_return_type.clone()
        };

        visiting.remove(&node.unique_id);
        resolved
    }

    fn common_child_type(
        artifact: &Artifact,
        node: &TemplateInstance,
        visiting: &mut HashSet<Id>,
    ) -> Option<ReturnType> {
        let mut common: Option<ReturnType> = None;
        for child_id in &node.child_instances {
            let child = artifact.instance(child_id)?;
            let child_type = Self::effective(artifact, child, visiting);
            match &common {
                None => common = Some(child_type),
                Some(existing) if *existing == child_type => {}
                Some(_) => return None,
            }
        }
        common
    }

    /// Every node except `exclude`, with its current return type
    pub fn other_instances(artifact: &Artifact, exclude: &str) -> Vec<OtherInstance> {
        artifact
            .instances()
            .filter(|node| node.unique_id != exclude)
            .map(|node| OtherInstance {
                unique_id: node.unique_id.clone(),
                name: node.display_name(),
                template_id: node.template_id.clone(),
                return_type: Self::effective_type(artifact, node),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::return_types;

    fn applied(id: &str, input: &str, output: &str) -> AppliedModifier {
        AppliedModifier {
            id: id.to_string(),
            name: id.to_string(),
            input_types: vec![input.to_string()],
            return_type: output.to_string(),
            values: None,
        }
    }

    #[test]
    fn test_fold_empty_chain_is_base() {
        assert_eq!(TypeResolver::fold_chain("observations", &[]), "observations");
    }

    #[test]
    fn test_fold_takes_last_return_type() {
        let chain = vec![
            applied("LookBackObservation", return_types::OBSERVATIONS, return_types::OBSERVATIONS),
            applied("BooleanExists", return_types::OBSERVATIONS, return_types::BOOLEAN),
        ];

        assert_eq!(
            TypeResolver::fold_chain(return_types::OBSERVATIONS, &chain),
            return_types::BOOLEAN
        );
        assert_eq!(
            TypeResolver::chain_types(&chain),
            vec!["observations".to_string(), "boolean".to_string()]
        );
        assert!(TypeResolver::validate_chain(return_types::OBSERVATIONS, &chain).is_ok());
    }

    #[test]
    fn test_validate_chain_reports_position() {
        let chain = vec![
            applied("BooleanExists", return_types::OBSERVATIONS, return_types::BOOLEAN),
            applied("VerifiedObservation", return_types::OBSERVATIONS, return_types::OBSERVATIONS),
        ];

        let err = TypeResolver::validate_chain(return_types::OBSERVATIONS, &chain).unwrap_err();
        assert_eq!(
            err,
            AuthoringError::InvalidModifierChain {
                position: 1,
                modifier_id: "VerifiedObservation".to_string(),
                input_type: return_types::BOOLEAN.to_string(),
            }
        );
    }
}
