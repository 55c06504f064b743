use crate::error::{AuthoringError, AuthoringResult};
use crate::logic::{ModifierRegistry, TypeResolver};
use crate::model::{AppliedModifier, Artifact, Id, ModifierDefinition, ReturnType};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

pub const IN_USE_ADVISORY: &str =
    "Limited expressions displayed because return type cannot change while in use.";

/// Modifiers that may be appended to a node right now
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierMenu {
    pub return_type: ReturnType,
    pub modifiers: Vec<ModifierDefinition>,
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advisory: Option<String>,
    pub can_remove_last: bool,
}

/// Decides which modifier edits keep a node's return type legal, given
/// whether the node is locked by a use
pub struct ModifierCompatibility;

impl ModifierCompatibility {
    pub fn has_in_use_ancestor(artifact: &Artifact, unique_id: &str) -> bool {
        artifact
            .ancestors(unique_id)
            .iter()
            .any(|ancestor| artifact.is_in_use(ancestor))
    }

    /// A node is locked when it, or any group containing it, is referenced
    pub fn is_locked(artifact: &Artifact, unique_id: &str) -> bool {
        artifact.is_in_use(unique_id) || Self::has_in_use_ancestor(artifact, unique_id)
    }

    pub fn addable_modifiers(
        artifact: &Artifact,
        registry: &ModifierRegistry,
        unique_id: &str,
    ) -> AuthoringResult<ModifierMenu> {
        let current = TypeResolver::resolve_return_type(artifact, unique_id)?;
        let locked = Self::is_locked(artifact, unique_id);

        let modifiers = registry
            .by_input_type(&current)
            .into_iter()
            .filter(|m| !locked || m.return_type == current)
            .cloned()
            .collect();

        Ok(ModifierMenu {
            return_type: current,
            modifiers,
            locked,
            advisory: locked.then(|| IN_USE_ADVISORY.to_string()),
            can_remove_last: Self::removable_last(artifact, unique_id)?,
        })
    }

    /// Whether the last modifier can be dropped without breaking the lock
    pub fn removable_last(artifact: &Artifact, unique_id: &str) -> AuthoringResult<bool> {
        let node = artifact.require(unique_id)?;
        let Some((_, remaining)) = node.modifiers.split_last() else {
            return Ok(false);
        };
        if !Self::is_locked(artifact, unique_id) {
            return Ok(true);
        }

        let base = TypeResolver::intrinsic_return_type(artifact, node);
        let before = TypeResolver::fold_chain(&base, &node.modifiers);
        let after = TypeResolver::fold_chain(&base, remaining);
        Ok(before == after)
    }

    /// Validate appending `modifier_id` and build the record to store
    pub fn check_add(
        artifact: &Artifact,
        registry: &ModifierRegistry,
        unique_id: &str,
        modifier_id: &str,
    ) -> AuthoringResult<AppliedModifier> {
        let node = artifact.require(unique_id)?;
        let definition = registry.require(modifier_id)?;
        let current = TypeResolver::effective_type(artifact, node);

        if !definition.accepts(&current) {
            return Err(AuthoringError::InvalidModifierChain {
                position: node.modifiers.len(),
                modifier_id: modifier_id.to_string(),
                input_type: current,
            });
        }
        if Self::is_locked(artifact, unique_id) && !definition.preserves(&current) {
            debug!(
                "Rejected type-changing modifier '{}' on locked instance '{}'",
                modifier_id, unique_id
            );
            return Err(AuthoringError::in_use(
                unique_id,
                format!("'{}' would change the return type from '{}'", modifier_id, current),
            ));
        }
        Ok(definition.to_applied())
    }

    pub fn check_remove_last(artifact: &Artifact, unique_id: &str) -> AuthoringResult<()> {
        let node = artifact.require(unique_id)?;
        if node.modifiers.is_empty() {
            return Err(AuthoringError::InvalidOperation(format!(
                "instance '{}' has no modifiers to remove",
                unique_id
            )));
        }
        if !Self::removable_last(artifact, unique_id)? {
            return Err(AuthoringError::in_use(
                unique_id,
                "removing the last modifier would change the return type",
            ));
        }
        Ok(())
    }

    /// Validate a wholesale replacement of the chain
    pub fn check_replace_chain(
        artifact: &Artifact,
        unique_id: &str,
        chain: &[AppliedModifier],
    ) -> AuthoringResult<()> {
        let node = artifact.require(unique_id)?;
        let base = TypeResolver::intrinsic_return_type(artifact, node);
        TypeResolver::validate_chain(&base, chain)?;

        if Self::is_locked(artifact, unique_id) {
            let before = TypeResolver::fold_chain(&base, &node.modifiers);
            let after = TypeResolver::fold_chain(&base, chain);
            if before != after {
                return Err(AuthoringError::in_use(
                    unique_id,
                    format!("new chain returns '{}' instead of '{}'", after, before),
                ));
            }
        }
        Ok(())
    }

    /// Revalidate the chains of everything whose input type can follow from
    /// the `touched` nodes: their enclosing groups, their uses, and in turn
    /// the groups and uses of those. Ids no longer in the artifact are skipped.
    pub fn check_dependent_chains(artifact: &Artifact, touched: &[Id]) -> AuthoringResult<()> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<Id> = touched.iter().cloned().collect();

        while let Some(id) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let Some(node) = artifact.instance(&id) else {
                continue;
            };
            if !node.modifiers.is_empty() {
                let base = TypeResolver::intrinsic_return_type(artifact, node);
                TypeResolver::validate_chain(&base, &node.modifiers).inspect_err(|_| {
                    debug!("Chain of '{}' no longer accepts input type '{}'", id, base);
                })?;
            }
            queue.extend(artifact.parent_of(&id).cloned());
            queue.extend(artifact.used_by(&id));
        }
        Ok(())
    }
}
