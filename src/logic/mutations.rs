use crate::error::{AuthoringError, AuthoringResult};
use crate::logic::{
    DivergenceWarning, ModifierCompatibility, ModifierRegistry, ReferenceEngine, TemplateCatalog,
    TypeResolver,
};
use crate::model::{
    AppliedModifier, Artifact, FieldEdit, FieldValue, Id, ModifierValues, TemplateInstance,
    TreeName, BASE_ELEMENT_REFERENCE_FIELD, BASE_ELEMENT_REFERENCE_TYPE,
};
use log::debug;
use serde::{Deserialize, Serialize};

/// Units accepted by look-back modifiers
pub const LOOK_BACK_UNITS: [&str; 7] = [
    "years", "months", "weeks", "days", "hours", "minutes", "seconds",
];

/// An edit to an artifact's trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TreeOperation {
    AddChild {
        parent_id: Id,
        template_id: Id,
    },
    AddBaseElement {
        template_id: Id,
    },
    /// Create a use of `referent_id`, under `parent_id` or as a new base element
    AddBaseElementUse {
        #[serde(default)]
        parent_id: Option<Id>,
        referent_id: Id,
    },
    AddSubpopulation {
        name: String,
    },
    DeleteSubpopulation {
        subpopulation_id: Id,
    },
    DeleteInstance {
        tree: TreeName,
        unique_id: Id,
    },
    EditInstance {
        tree: TreeName,
        unique_id: Id,
        edits: Vec<FieldEdit>,
        #[serde(default)]
        cascade: bool,
    },
    UpdateInstanceModifiers {
        tree: TreeName,
        unique_id: Id,
        modifiers: Vec<AppliedModifier>,
    },
    AddModifier {
        unique_id: Id,
        modifier_id: Id,
    },
    RemoveLastModifier {
        unique_id: Id,
    },
    UpdateModifierValues {
        unique_id: Id,
        index: usize,
        values: ModifierValues,
    },
    Reorder {
        unique_id: Id,
        to_index: usize,
    },
    /// Wrap the node in a new group of its parent's template
    Indent {
        unique_id: Id,
    },
    /// Move the node up to its grandparent, right after its old parent
    Outdent {
        unique_id: Id,
    },
}

impl TreeOperation {
    pub fn name(&self) -> &'static str {
        match self {
            TreeOperation::AddChild { .. } => "add_child",
            TreeOperation::AddBaseElement { .. } => "add_base_element",
            TreeOperation::AddBaseElementUse { .. } => "add_base_element_use",
            TreeOperation::AddSubpopulation { .. } => "add_subpopulation",
            TreeOperation::DeleteSubpopulation { .. } => "delete_subpopulation",
            TreeOperation::DeleteInstance { .. } => "delete_instance",
            TreeOperation::EditInstance { .. } => "edit_instance",
            TreeOperation::UpdateInstanceModifiers { .. } => "update_instance_modifiers",
            TreeOperation::AddModifier { .. } => "add_modifier",
            TreeOperation::RemoveLastModifier { .. } => "remove_last_modifier",
            TreeOperation::UpdateModifierValues { .. } => "update_modifier_values",
            TreeOperation::Reorder { .. } => "reorder",
            TreeOperation::Indent { .. } => "indent",
            TreeOperation::Outdent { .. } => "outdent",
        }
    }
}

/// New artifact state plus what the caller needs to show feedback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub artifact: Artifact,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<Id>,
    #[serde(default)]
    pub removed: Vec<Id>,
    #[serde(default)]
    pub warnings: Vec<DivergenceWarning>,
    /// Uses that could receive an edit made to their definition. Nothing is
    /// propagated automatically.
    #[serde(default)]
    pub cascade_candidates: Vec<Id>,
}

impl OperationOutcome {
    fn new(artifact: Artifact) -> Self {
        Self {
            artifact,
            created: None,
            removed: Vec::new(),
            warnings: Vec::new(),
            cascade_candidates: Vec::new(),
        }
    }
}

/// Applies tree operations as pure functions of the current artifact. A
/// rejected operation returns an error and the input is never touched.
pub struct TreeMutator<'a> {
    registry: &'a ModifierRegistry,
    catalog: &'a TemplateCatalog,
}

impl<'a> TreeMutator<'a> {
    pub fn new(registry: &'a ModifierRegistry, catalog: &'a TemplateCatalog) -> Self {
        Self { registry, catalog }
    }

    pub fn apply(&self, artifact: &Artifact, operation: &TreeOperation) -> AuthoringResult<OperationOutcome> {
        self.dispatch(artifact, operation).inspect_err(|e| {
            debug!(
                "Rejected {} on artifact '{}': {}",
                operation.name(),
                artifact.id,
                e
            );
        })
    }

    fn dispatch(&self, artifact: &Artifact, operation: &TreeOperation) -> AuthoringResult<OperationOutcome> {
        let outcome = self.run(artifact, operation)?;
        let mut touched = Self::touched(artifact, operation);
        touched.extend(outcome.created.clone());
        ModifierCompatibility::check_dependent_chains(&outcome.artifact, &touched)?;
        Ok(outcome)
    }

    /// Nodes whose input type the operation can change, read before it runs.
    /// Their groups and uses are reached from here.
    fn touched(artifact: &Artifact, operation: &TreeOperation) -> Vec<Id> {
        match operation {
            TreeOperation::AddChild { parent_id, .. } => vec![parent_id.clone()],
            TreeOperation::AddBaseElementUse { parent_id, .. } => parent_id.iter().cloned().collect(),
            TreeOperation::DeleteInstance { unique_id, .. } => {
                artifact.parent_of(unique_id).into_iter().cloned().collect()
            }
            TreeOperation::Indent { unique_id } | TreeOperation::Outdent { unique_id } => {
                let mut ids = vec![unique_id.clone()];
                ids.extend(artifact.parent_of(unique_id).cloned());
                ids
            }
            TreeOperation::EditInstance { unique_id, .. }
            | TreeOperation::UpdateInstanceModifiers { unique_id, .. }
            | TreeOperation::AddModifier { unique_id, .. }
            | TreeOperation::RemoveLastModifier { unique_id }
            | TreeOperation::UpdateModifierValues { unique_id, .. } => vec![unique_id.clone()],
            TreeOperation::AddBaseElement { .. }
            | TreeOperation::AddSubpopulation { .. }
            | TreeOperation::DeleteSubpopulation { .. }
            | TreeOperation::Reorder { .. } => Vec::new(),
        }
    }

    fn run(&self, artifact: &Artifact, operation: &TreeOperation) -> AuthoringResult<OperationOutcome> {
        match operation {
            TreeOperation::AddChild {
                parent_id,
                template_id,
            } => self.add_child(artifact, parent_id, template_id),
            TreeOperation::AddBaseElement { template_id } => self.add_base_element(artifact, template_id),
            TreeOperation::AddBaseElementUse {
                parent_id,
                referent_id,
            } => self.add_base_element_use(artifact, parent_id.as_deref(), referent_id),
            TreeOperation::AddSubpopulation { name } => self.add_subpopulation(artifact, name),
            TreeOperation::DeleteSubpopulation { subpopulation_id } => {
                self.delete_subpopulation(artifact, subpopulation_id)
            }
            TreeOperation::DeleteInstance { tree, unique_id } => {
                self.delete_instance(artifact, tree, unique_id)
            }
            TreeOperation::EditInstance {
                tree,
                unique_id,
                edits,
                cascade,
            } => self.edit_instance(artifact, tree, unique_id, edits, *cascade),
            TreeOperation::UpdateInstanceModifiers {
                tree,
                unique_id,
                modifiers,
            } => self.update_instance_modifiers(artifact, tree, unique_id, modifiers),
            TreeOperation::AddModifier {
                unique_id,
                modifier_id,
            } => self.add_modifier(artifact, unique_id, modifier_id),
            TreeOperation::RemoveLastModifier { unique_id } => self.remove_last_modifier(artifact, unique_id),
            TreeOperation::UpdateModifierValues {
                unique_id,
                index,
                values,
            } => self.update_modifier_values(artifact, unique_id, *index, values),
            TreeOperation::Reorder {
                unique_id,
                to_index,
            } => self.reorder(artifact, unique_id, *to_index),
            TreeOperation::Indent { unique_id } => self.indent(artifact, unique_id),
            TreeOperation::Outdent { unique_id } => self.outdent(artifact, unique_id),
        }
    }

    /// Refuse structural edits inside a group that something references
    fn ensure_structure_unlocked(artifact: &Artifact, unique_id: &str, action: &str) -> AuthoringResult<()> {
        if ModifierCompatibility::has_in_use_ancestor(artifact, unique_id) {
            return Err(AuthoringError::in_use(
                unique_id,
                format!("cannot {} inside a group that is in use", action),
            ));
        }
        Ok(())
    }

    /// `parent_id` must be a group that can take another child
    fn check_new_child_parent(artifact: &Artifact, parent_id: &str) -> AuthoringResult<()> {
        let parent = artifact.require(parent_id)?;
        if !parent.kind.is_group() {
            return Err(AuthoringError::InvalidOperation(format!(
                "instance '{}' cannot hold child instances",
                parent_id
            )));
        }
        if ModifierCompatibility::is_locked(artifact, parent_id) {
            return Err(AuthoringError::in_use(
                parent_id,
                "cannot add elements to a group that is in use",
            ));
        }
        Ok(())
    }

    fn add_child(&self, artifact: &Artifact, parent_id: &str, template_id: &str) -> AuthoringResult<OperationOutcome> {
        Self::check_new_child_parent(artifact, parent_id)?;
        let template = self.catalog.require(template_id)?;

        let mut next = artifact.clone();
        let node = TemplateInstance::from_template(template);
        let created = node.unique_id.clone();
        next.insert_child(parent_id, node, None)?;

        let mut outcome = OperationOutcome::new(next);
        outcome.created = Some(created);
        Ok(outcome)
    }

    fn add_base_element(&self, artifact: &Artifact, template_id: &str) -> AuthoringResult<OperationOutcome> {
        let template = self.catalog.require(template_id)?;

        let mut next = artifact.clone();
        let node = TemplateInstance::from_template(template);
        let created = node.unique_id.clone();
        next.insert_base_element(node);

        let mut outcome = OperationOutcome::new(next);
        outcome.created = Some(created);
        Ok(outcome)
    }

    fn add_base_element_use(
        &self,
        artifact: &Artifact,
        parent_id: Option<&str>,
        referent_id: &str,
    ) -> AuthoringResult<OperationOutcome> {
        let referent = artifact.require(referent_id)?;
        // resolving the path rejects uses of broken reference chains
        ReferenceEngine::reference_path(artifact, referent_id)?;

        if let Some(parent_id) = parent_id {
            if ReferenceEngine::creates_cycle(artifact, parent_id, referent_id) {
                return Err(AuthoringError::CyclicReference {
                    use_id: parent_id.to_string(),
                    target_id: referent_id.to_string(),
                });
            }
            Self::check_new_child_parent(artifact, parent_id)?;
        }

        let referent_type = TypeResolver::effective_type(artifact, referent);
        let node = TemplateInstance::use_of(referent, referent_type);
        let created = node.unique_id.clone();

        let mut next = artifact.clone();
        match parent_id {
            Some(parent_id) => next.insert_child(parent_id, node, None)?,
            None => next.insert_base_element(node),
        }

        let mut outcome = OperationOutcome::new(next);
        outcome.warnings = ReferenceEngine::sibling_warnings(&outcome.artifact, &created)?;
        outcome.created = Some(created);
        Ok(outcome)
    }

    fn add_subpopulation(&self, artifact: &Artifact, name: &str) -> AuthoringResult<OperationOutcome> {
        let root = TemplateInstance::from_template(self.catalog.root_template());

        let mut next = artifact.clone();
        let created = next.insert_subpopulation(name, root);

        let mut outcome = OperationOutcome::new(next);
        outcome.created = Some(created);
        Ok(outcome)
    }

    fn delete_subpopulation(&self, artifact: &Artifact, subpopulation_id: &str) -> AuthoringResult<OperationOutcome> {
        let root = artifact
            .subpopulations
            .iter()
            .find(|s| s.unique_id == subpopulation_id)
            .map(|s| s.root.clone())
            .ok_or_else(|| AuthoringError::InstanceNotFound(subpopulation_id.to_string()))?;
        Self::ensure_subtree_unreferenced(artifact, &root)?;

        let mut next = artifact.clone();
        let removed = next.remove_subtree(&root)?;

        let mut outcome = OperationOutcome::new(next);
        outcome.removed = removed.into_iter().map(|n| n.unique_id).collect();
        Ok(outcome)
    }

    /// Nothing outside the subtree may reference a node inside it
    fn ensure_subtree_unreferenced(artifact: &Artifact, unique_id: &str) -> AuthoringResult<()> {
        if artifact.is_in_use(unique_id) {
            return Err(AuthoringError::in_use(unique_id, "it is referenced by other elements"));
        }
        let subtree = artifact.subtree(unique_id);
        for id in &subtree {
            let outside = artifact
                .used_by(id)
                .into_iter()
                .find(|user| !subtree.contains(user));
            if let Some(user) = outside {
                return Err(AuthoringError::in_use(
                    unique_id,
                    format!("descendant '{}' is referenced by '{}'", id, user),
                ));
            }
        }
        Ok(())
    }

    fn delete_instance(&self, artifact: &Artifact, tree: &TreeName, unique_id: &str) -> AuthoringResult<OperationOutcome> {
        artifact.ensure_in_tree(unique_id, tree)?;
        let is_base_element = artifact.base_elements.iter().any(|b| b == unique_id);
        if artifact.is_tree_root(unique_id) && !is_base_element {
            return Err(AuthoringError::InvalidOperation(format!(
                "instance '{}' is the root of {} and cannot be deleted",
                unique_id, tree
            )));
        }
        Self::ensure_subtree_unreferenced(artifact, unique_id)?;
        Self::ensure_structure_unlocked(artifact, unique_id, "delete elements")?;

        let referent = artifact
            .require(unique_id)?
            .base_element_reference()
            .cloned();

        let mut next = artifact.clone();
        let removed = next.remove_subtree(unique_id)?;

        let mut outcome = OperationOutcome::new(next);
        outcome.removed = removed.into_iter().map(|n| n.unique_id).collect();
        if let Some(referent) = referent {
            outcome.warnings = Self::warnings_for_uses_of(&outcome.artifact, &referent)?;
        }
        Ok(outcome)
    }

    fn edit_instance(
        &self,
        artifact: &Artifact,
        tree: &TreeName,
        unique_id: &str,
        edits: &[FieldEdit],
        cascade: bool,
    ) -> AuthoringResult<OperationOutcome> {
        artifact.ensure_in_tree(unique_id, tree)?;
        let locked = ModifierCompatibility::is_locked(artifact, unique_id);
        let type_before = TypeResolver::resolve_return_type(artifact, unique_id)?;

        let mut next = artifact.clone();
        for edit in edits {
            Self::apply_field_edit(&mut next, unique_id, edit)?;
        }

        let node = next.require(unique_id)?;
        let intrinsic = TypeResolver::intrinsic_return_type(&next, node);
        TypeResolver::validate_chain(&intrinsic, &node.modifiers)?;
        let type_after = TypeResolver::fold_chain(&intrinsic, &node.modifiers);
        if locked && type_after != type_before {
            return Err(AuthoringError::in_use(
                unique_id,
                format!("edit would change the return type from '{}' to '{}'", type_before, type_after),
            ));
        }

        let reference = node.base_element_reference().cloned();
        let mut outcome = OperationOutcome::new(next);
        outcome.warnings = match reference {
            Some(referent) => Self::warnings_for_uses_of(&outcome.artifact, &referent)?,
            None => Self::warnings_for_uses_of(&outcome.artifact, unique_id)?,
        };
        if cascade {
            outcome.cascade_candidates = outcome.artifact.used_by(unique_id);
        }
        Ok(outcome)
    }

    fn apply_field_edit(artifact: &mut Artifact, unique_id: &str, edit: &FieldEdit) -> AuthoringResult<()> {
        let field = artifact
            .require(unique_id)?
            .field(&edit.field_id)
            .ok_or_else(|| AuthoringError::UnknownField {
                unique_id: unique_id.to_string(),
                field_id: edit.field_id.clone(),
            })?;

        if let Some(value) = &edit.value {
            if !value.fits(field.field_type) {
                return Err(AuthoringError::InvalidFieldValue {
                    field_id: edit.field_id.clone(),
                    reason: format!("expected a {:?} value", field.field_type),
                });
            }
        }

        if edit.field_id == BASE_ELEMENT_REFERENCE_FIELD {
            let target = match &edit.value {
                Some(FieldValue::Reference(reference)) => {
                    if reference.reference_type != BASE_ELEMENT_REFERENCE_TYPE {
                        return Err(AuthoringError::InvalidFieldValue {
                            field_id: edit.field_id.clone(),
                            reason: format!("unsupported reference type '{}'", reference.reference_type),
                        });
                    }
                    ReferenceEngine::check_retarget(artifact, unique_id, &reference.id)?;
                    Some(reference.id.clone())
                }
                None => None,
                Some(_) => {
                    return Err(AuthoringError::InvalidFieldValue {
                        field_id: edit.field_id.clone(),
                        reason: "expected a base element reference".to_string(),
                    })
                }
            };
            artifact.retarget_use(unique_id, target.as_deref());
        }

        let node = artifact.require_mut(unique_id)?;
        if let Some(field) = node.field_mut(&edit.field_id) {
            field.value = edit.value.clone();
        }
        Ok(())
    }

    fn update_instance_modifiers(
        &self,
        artifact: &Artifact,
        tree: &TreeName,
        unique_id: &str,
        modifiers: &[AppliedModifier],
    ) -> AuthoringResult<OperationOutcome> {
        artifact.ensure_in_tree(unique_id, tree)?;
        let chain = modifiers
            .iter()
            .map(|m| self.canonical(m))
            .collect::<AuthoringResult<Vec<_>>>()?;
        ModifierCompatibility::check_replace_chain(artifact, unique_id, &chain)?;

        let mut next = artifact.clone();
        next.require_mut(unique_id)?.modifiers = chain;
        self.after_modifier_change(next, unique_id)
    }

    /// Rebuild an applied modifier from its registry definition, keeping
    /// only the caller's parameter values
    fn canonical(&self, modifier: &AppliedModifier) -> AuthoringResult<AppliedModifier> {
        let definition = self.registry.require(&modifier.id)?;
        let mut applied = definition.to_applied();
        if let Some(values) = &modifier.values {
            applied.values = Some(self.merged_values(&applied, values)?);
        }
        Ok(applied)
    }

    fn add_modifier(&self, artifact: &Artifact, unique_id: &str, modifier_id: &str) -> AuthoringResult<OperationOutcome> {
        let applied = ModifierCompatibility::check_add(artifact, self.registry, unique_id, modifier_id)?;

        let mut next = artifact.clone();
        next.require_mut(unique_id)?.modifiers.push(applied);
        self.after_modifier_change(next, unique_id)
    }

    fn remove_last_modifier(&self, artifact: &Artifact, unique_id: &str) -> AuthoringResult<OperationOutcome> {
        ModifierCompatibility::check_remove_last(artifact, unique_id)?;

        let mut next = artifact.clone();
        next.require_mut(unique_id)?.modifiers.pop();
        self.after_modifier_change(next, unique_id)
    }

    fn update_modifier_values(
        &self,
        artifact: &Artifact,
        unique_id: &str,
        index: usize,
        values: &ModifierValues,
    ) -> AuthoringResult<OperationOutcome> {
        let node = artifact.require(unique_id)?;
        let applied = node.modifiers.get(index).ok_or_else(|| {
            AuthoringError::InvalidOperation(format!(
                "instance '{}' has no modifier at position {}",
                unique_id, index
            ))
        })?;
        let merged = self.merged_values(applied, values)?;

        let mut next = artifact.clone();
        if let Some(modifier) = next.require_mut(unique_id)?.modifiers.get_mut(index) {
            modifier.values = Some(merged);
        }
        self.after_modifier_change(next, unique_id)
    }

    /// Overlay `values` on the modifier's current values. Only keys the
    /// definition declares are accepted.
    fn merged_values(&self, applied: &AppliedModifier, values: &ModifierValues) -> AuthoringResult<ModifierValues> {
        let definition = self.registry.require(&applied.id)?;
        let declared = definition.values.as_ref().ok_or_else(|| AuthoringError::InvalidModifierValues {
            modifier_id: applied.id.clone(),
            reason: "modifier takes no values".to_string(),
        })?;
        let invalid = |reason: String| AuthoringError::InvalidModifierValues {
            modifier_id: applied.id.clone(),
            reason,
        };

        let is_look_back = declared.contains_key("value") && declared.contains_key("unit");
        for (key, value) in values {
            if !declared.contains_key(key) {
                return Err(invalid(format!("unknown value '{}'", key)));
            }
            if is_look_back && !value.is_null() {
                match key.as_str() {
                    "unit" => {
                        let unit = value.as_str().unwrap_or_default();
                        if !LOOK_BACK_UNITS.contains(&unit) {
                            return Err(invalid(format!("unsupported unit {}", value)));
                        }
                    }
                    "value" => {
                        let numeric = value.is_number()
                            || value.as_str().map(|s| s.trim().parse::<f64>().is_ok()).unwrap_or(false);
                        if !numeric {
                            return Err(invalid(format!("'{}' is not a number", value)));
                        }
                    }
                    _ => {}
                }
            }
        }

        let mut merged = applied.values.clone().unwrap_or_else(|| declared.clone());
        merged.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(merged)
    }

    fn after_modifier_change(&self, next: Artifact, unique_id: &str) -> AuthoringResult<OperationOutcome> {
        let reference = next.require(unique_id)?.base_element_reference().cloned();
        let mut outcome = OperationOutcome::new(next);
        if let Some(referent) = reference {
            outcome.warnings = Self::warnings_for_uses_of(&outcome.artifact, &referent)?;
        }
        Ok(outcome)
    }

    fn warnings_for_uses_of(artifact: &Artifact, referent_id: &str) -> AuthoringResult<Vec<DivergenceWarning>> {
        let mut warnings = Vec::new();
        for use_id in artifact.used_by(referent_id) {
            if let Some(warning) = ReferenceEngine::divergence_warning(artifact, &use_id)? {
                warnings.push(warning);
            }
        }
        Ok(warnings)
    }

    fn reorder(&self, artifact: &Artifact, unique_id: &str, to_index: usize) -> AuthoringResult<OperationOutcome> {
        let parent_id = Self::parent_or_err(artifact, unique_id)?;
        Self::ensure_structure_unlocked(artifact, unique_id, "reorder elements")?;
        if to_index >= artifact.children(&parent_id).len() {
            return Err(AuthoringError::InvalidOperation(format!(
                "position {} is out of range",
                to_index
            )));
        }

        let mut next = artifact.clone();
        next.detach(unique_id)?;
        next.attach(unique_id, &parent_id, to_index)?;
        Ok(OperationOutcome::new(next))
    }

    fn indent(&self, artifact: &Artifact, unique_id: &str) -> AuthoringResult<OperationOutcome> {
        let parent_id = Self::parent_or_err(artifact, unique_id)?;
        Self::ensure_structure_unlocked(artifact, unique_id, "indent elements")?;
        let parent = artifact.require(&parent_id)?;
        let template = self.catalog.require(&parent.template_id)?;

        let mut next = artifact.clone();
        let index = next.detach(unique_id)?;
        let group = TemplateInstance::from_template(template);
        let group_id = group.unique_id.clone();
        next.insert_child(&parent_id, group, Some(index))?;
        next.attach(unique_id, &group_id, 0)?;

        let mut outcome = OperationOutcome::new(next);
        outcome.created = Some(group_id);
        Ok(outcome)
    }

    fn outdent(&self, artifact: &Artifact, unique_id: &str) -> AuthoringResult<OperationOutcome> {
        let parent_id = Self::parent_or_err(artifact, unique_id)?;
        let grandparent_id = artifact.parent_of(&parent_id).cloned().ok_or_else(|| {
            AuthoringError::InvalidOperation(format!(
                "instance '{}' is already at the top level",
                unique_id
            ))
        })?;
        Self::ensure_structure_unlocked(artifact, unique_id, "outdent elements")?;

        let parent_index = artifact
            .children(&grandparent_id)
            .iter()
            .position(|c| *c == parent_id)
            .ok_or_else(|| AuthoringError::InstanceNotFound(parent_id.clone()))?;

        let mut next = artifact.clone();
        next.detach(unique_id)?;
        next.attach(unique_id, &grandparent_id, parent_index + 1)?;
        Ok(OperationOutcome::new(next))
    }

    fn parent_or_err(artifact: &Artifact, unique_id: &str) -> AuthoringResult<Id> {
        artifact.require(unique_id)?;
        artifact.parent_of(unique_id).cloned().ok_or_else(|| {
            AuthoringError::InvalidOperation(format!(
                "instance '{}' is not inside a group",
                unique_id
            ))
        })
    }
}
