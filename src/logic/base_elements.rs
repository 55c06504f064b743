use crate::error::{AuthoringError, AuthoringResult};
use crate::logic::{ModifierCompatibility, TypeResolver};
use crate::model::{AppliedModifier, Artifact, Field, FieldValue, Id, ReturnType, TemplateInstance};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const DIVERGENCE_WARNING: &str =
    "Warning: This use of the Base Element has changed. Choose another name.";

/// Shown in place of a name when a use points at a missing node
pub const UNKNOWN_REFERENCE_NAME: &str = "unknown reference";

/// Description and type of a use, resolved against its root definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootPhrase {
    pub root_id: Id,
    pub root_name: String,
    pub phrase: String,
    pub return_type: ReturnType,
    /// Root chain followed by every chain down the reference path
    pub modifiers: Vec<AppliedModifier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivergenceWarning {
    pub unique_id: Id,
    pub referent_id: Id,
    pub message: String,
}

/// Resolves use nodes to the nodes they reference and keeps reference
/// edits acyclic
pub struct ReferenceEngine;

impl ReferenceEngine {
    /// The node followed by each referent in turn, ending at the root definition
    pub fn reference_path<'a>(
        artifact: &'a Artifact,
        unique_id: &str,
    ) -> AuthoringResult<Vec<&'a TemplateInstance>> {
        let mut path = vec![artifact.require(unique_id)?];
        let mut seen = HashSet::from([unique_id.to_string()]);

        while let Some(referent_id) = path[path.len() - 1].base_element_reference() {
            let current = &path[path.len() - 1].unique_id;
            if !seen.insert(referent_id.clone()) {
                return Err(AuthoringError::CyclicReference {
                    use_id: current.clone(),
                    target_id: referent_id.clone(),
                });
            }
            let referent = artifact.instance(referent_id).ok_or_else(|| {
                AuthoringError::UnresolvedReference {
                    use_id: current.clone(),
                    target_id: referent_id.clone(),
                }
            })?;
            path.push(referent);
        }
        Ok(path)
    }

    /// Follow references transitively to the definition at the end
    pub fn resolve_root<'a>(artifact: &'a Artifact, unique_id: &str) -> AuthoringResult<&'a TemplateInstance> {
        let path = Self::reference_path(artifact, unique_id)?;
        Ok(path[path.len() - 1])
    }

    /// Name of the immediate referent (one hop)
    pub fn display_name(artifact: &Artifact, unique_id: &str) -> AuthoringResult<String> {
        let node = artifact.require(unique_id)?;
        Ok(match node.base_element_reference() {
            Some(referent_id) => artifact
                .instance(referent_id)
                .map(TemplateInstance::display_name)
                .unwrap_or_else(|| UNKNOWN_REFERENCE_NAME.to_string()),
            None => node.display_name(),
        })
    }

    /// Root definition's phrase and chain combined with every chain on the
    /// path down to this node
    pub fn root_phrase_and_type(artifact: &Artifact, unique_id: &str) -> AuthoringResult<RootPhrase> {
        let path = Self::reference_path(artifact, unique_id)?;
        let root = path[path.len() - 1];

        let modifiers: Vec<AppliedModifier> = path
            .iter()
            .rev()
            .flat_map(|node| node.modifiers.iter().cloned())
            .collect();
        let base = TypeResolver::intrinsic_return_type(artifact, root);
        let return_type = TypeResolver::fold_chain(&base, &modifiers);

        let mut parts = vec![Self::describe(root)];
        parts.extend(modifiers.iter().map(Self::modifier_label));

        Ok(RootPhrase {
            root_id: root.unique_id.clone(),
            root_name: root.display_name(),
            phrase: parts.join(", "),
            return_type,
            modifiers,
        })
    }

    fn describe(node: &TemplateInstance) -> String {
        let mut phrase = match node.element_name() {
            Some(name) => format!("{}: {}", node.name, name),
            None => node.name.clone(),
        };
        for field in node.content_fields() {
            match &field.value {
                Some(FieldValue::ValueSets(sets)) if !sets.is_empty() => {
                    phrase.push_str(&format!(
                        " with a code from {}",
                        sets.iter().map(|s| s.name.as_str()).join(" or ")
                    ));
                }
                Some(FieldValue::Codes(codes)) if !codes.is_empty() => {
                    phrase.push_str(&format!(
                        " with code {}",
                        codes
                            .iter()
                            .map(|c| format!("{} ({})", c.code, c.code_system.name))
                            .join(" or ")
                    ));
                }
                _ => {}
            }
        }
        phrase
    }

    fn modifier_label(modifier: &AppliedModifier) -> String {
        let values = modifier.values.as_ref();
        match (
            values.and_then(|v| v.get("value")).filter(|v| !v.is_null()),
            values.and_then(|v| v.get("unit")).and_then(|u| u.as_str()),
        ) {
            (Some(value), Some(unit)) => {
                let value = value
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_string());
                format!("{} {} {}", modifier.name, value, unit)
            }
            _ => modifier.name.clone(),
        }
    }

    /// Single-hop divergence check of a use against its referent's last
    /// saved fields. Reverting the edit clears the warning.
    pub fn divergence_warning(
        artifact: &Artifact,
        unique_id: &str,
    ) -> AuthoringResult<Option<DivergenceWarning>> {
        let node = artifact.require(unique_id)?;
        let Some(referent_id) = node.base_element_reference() else {
            return Ok(None);
        };
        let Some(referent) = artifact.instance(referent_id) else {
            return Ok(None);
        };

        let baseline: &[Field] = artifact
            .saved_fields(referent_id)
            .unwrap_or(&referent.fields);
        let baseline_content: Vec<&Field> = baseline
            .iter()
            .filter(|f| referent.content_fields().any(|c| c.id == f.id))
            .collect();
        let use_content: Vec<&Field> = node.content_fields().collect();

        let fields_changed = !same_values(&use_content, &baseline_content);
        if !fields_changed && node.modifiers.is_empty() {
            return Ok(None);
        }

        let name = node.display_name();
        let name_shared = artifact
            .used_by(referent_id)
            .iter()
            .filter(|other| other.as_str() != unique_id)
            .filter_map(|other| artifact.instance(other))
            .any(|other| other.display_name() == name);
        if name_shared {
            return Ok(None);
        }

        Ok(Some(DivergenceWarning {
            unique_id: unique_id.to_string(),
            referent_id: referent_id.clone(),
            message: DIVERGENCE_WARNING.to_string(),
        }))
    }

    /// Warnings for every use of the same referent as `unique_id`
    pub fn sibling_warnings(artifact: &Artifact, unique_id: &str) -> AuthoringResult<Vec<DivergenceWarning>> {
        let node = artifact.require(unique_id)?;
        let Some(referent_id) = node.base_element_reference() else {
            return Ok(Vec::new());
        };
        let mut warnings = Vec::new();
        for use_id in artifact.used_by(referent_id) {
            if let Some(warning) = Self::divergence_warning(artifact, &use_id)? {
                warnings.push(warning);
            }
        }
        Ok(warnings)
    }

    /// Everything `target_id` pulls in: its subtree and whatever the uses in
    /// there refer to, followed until nothing new turns up
    pub fn dependency_closure(artifact: &Artifact, target_id: &str) -> HashSet<Id> {
        let mut closure = HashSet::new();
        let mut pending = vec![target_id.to_string()];
        while let Some(id) = pending.pop() {
            for member in artifact.subtree(&id) {
                if let Some(referent) = artifact
                    .instance(&member)
                    .and_then(TemplateInstance::base_element_reference)
                {
                    if !closure.contains(referent) {
                        pending.push(referent.clone());
                    }
                }
                closure.insert(member);
            }
        }
        closure
    }

    /// Whether a reference held at `holder_id` to `target_id` would make
    /// the target depend on the holder or on a group containing it
    pub fn creates_cycle(artifact: &Artifact, holder_id: &str, target_id: &str) -> bool {
        let closure = Self::dependency_closure(artifact, target_id);
        closure.contains(holder_id)
            || artifact
                .ancestors(holder_id)
                .iter()
                .any(|ancestor| closure.contains(ancestor))
    }

    /// Validate pointing `use_id` at `target_id`
    pub fn check_retarget(artifact: &Artifact, use_id: &str, target_id: &str) -> AuthoringResult<()> {
        let node = artifact.require(use_id)?;
        if artifact.instance(target_id).is_none() {
            return Err(AuthoringError::UnresolvedReference {
                use_id: use_id.to_string(),
                target_id: target_id.to_string(),
            });
        }
        let cyclic = AuthoringError::CyclicReference {
            use_id: use_id.to_string(),
            target_id: target_id.to_string(),
        };
        if artifact.is_descendant_of(target_id, use_id) || Self::creates_cycle(artifact, use_id, target_id) {
            return Err(cyclic);
        }
        let target_path = Self::reference_path(artifact, target_id)?;

        if ModifierCompatibility::is_locked(artifact, use_id) {
            let before = TypeResolver::effective_type(artifact, node);
            let target = target_path[0];
            let after = TypeResolver::fold_chain(
                &TypeResolver::effective_type(artifact, target),
                &node.modifiers,
            );
            if before != after {
                return Err(AuthoringError::in_use(
                    use_id,
                    format!("retarget would change the return type from '{}' to '{}'", before, after),
                ));
            }
        }
        Ok(())
    }
}

fn same_values(left: &[&Field], right: &[&Field]) -> bool {
    left.len() == right.len()
        && left.iter().all(|l| {
            right
                .iter()
                .any(|r| r.id == l.id && normalized(&r.value) == normalized(&l.value))
        })
}

/// Empty text and an unset value compare equal
fn normalized(value: &Option<FieldValue>) -> Option<&FieldValue> {
    match value {
        Some(FieldValue::Text(text)) if text.is_empty() => None,
        other => other.as_ref(),
    }
}
