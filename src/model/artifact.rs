use crate::error::{AuthoringError, AuthoringResult};
use crate::model::{generate_id, Field, Id, TemplateDefinition, TemplateInstance, UserContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Which top-level collection of an artifact a node lives in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "tree", content = "id", rename_all = "snake_case")]
pub enum TreeName {
    ExpTreeInclude,
    ExpTreeExclude,
    BaseElements,
    Subpopulation(Id),
}

impl fmt::Display for TreeName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TreeName::ExpTreeInclude => write!(f, "expTreeInclude"),
            TreeName::ExpTreeExclude => write!(f, "expTreeExclude"),
            TreeName::BaseElements => write!(f, "baseElements"),
            TreeName::Subpopulation(id) => write!(f, "subpopulation:{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subpopulation {
    pub unique_id: Id,
    pub name: String,
    pub root: Id,
}

/// Referent id -> ids of the use nodes pointing at it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageIndex {
    by_referent: BTreeMap<Id, BTreeSet<Id>>,
}

impl UsageIndex {
    pub fn register(&mut self, referent: &str, user: &str) {
        self.by_referent
            .entry(referent.to_string())
            .or_default()
            .insert(user.to_string());
    }

    pub fn unregister(&mut self, referent: &str, user: &str) {
        if let Some(users) = self.by_referent.get_mut(referent) {
            users.remove(user);
            if users.is_empty() {
                self.by_referent.remove(referent);
            }
        }
    }

    pub fn used_by(&self, referent: &str) -> Vec<Id> {
        self.by_referent
            .get(referent)
            .map(|users| users.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_in_use(&self, referent: &str) -> bool {
        self.by_referent
            .get(referent)
            .map(|users| !users.is_empty())
            .unwrap_or(false)
    }
}

/// A CDS artifact: the inclusion/exclusion trees, subpopulations and base
/// elements, stored as an arena of nodes keyed by unique id.
///
/// The parent index and the usage index are derived from the nodes and are
/// rebuilt whenever an artifact is deserialized, and a body that is not a
/// forest is refused at that point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ArtifactRecord", into = "ArtifactRecord")]
pub struct Artifact {
    pub id: Id,
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub exp_tree_include: Id,
    pub exp_tree_exclude: Id,
    pub subpopulations: Vec<Subpopulation>,
    pub base_elements: Vec<Id>,
    instances: BTreeMap<Id, TemplateInstance>,
    parents: HashMap<Id, Id>,
    usages: UsageIndex,
    saved_fields: BTreeMap<Id, Vec<Field>>,
    /// SHA-256 of the tree content at the last successful save
    pub revision: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

/// Wire shape of an artifact; only authoritative data, no derived indexes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactRecord {
    id: Id,
    name: String,
    version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    exp_tree_include: Id,
    exp_tree_exclude: Id,
    #[serde(default)]
    subpopulations: Vec<Subpopulation>,
    #[serde(default)]
    base_elements: Vec<Id>,
    instances: BTreeMap<Id, TemplateInstance>,
    #[serde(default)]
    saved_fields: BTreeMap<Id, Vec<Field>>,
    #[serde(default)]
    revision: Option<String>,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_by: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ArtifactRecord> for Artifact {
    type Error = AuthoringError;

    fn try_from(record: ArtifactRecord) -> AuthoringResult<Self> {
        let mut artifact = Artifact {
            id: record.id,
            name: record.name,
            version: record.version,
            description: record.description,
            exp_tree_include: record.exp_tree_include,
            exp_tree_exclude: record.exp_tree_exclude,
            subpopulations: record.subpopulations,
            base_elements: record.base_elements,
            instances: record.instances,
            parents: HashMap::new(),
            usages: UsageIndex::default(),
            saved_fields: record.saved_fields,
            revision: record.revision,
            created_by: record.created_by,
            created_at: record.created_at,
            updated_by: record.updated_by,
            updated_at: record.updated_at,
        };
        artifact.rebuild_indexes();
        artifact.check_integrity()?;
        Ok(artifact)
    }
}

impl From<Artifact> for ArtifactRecord {
    fn from(artifact: Artifact) -> Self {
        ArtifactRecord {
            id: artifact.id,
            name: artifact.name,
            version: artifact.version,
            description: artifact.description,
            exp_tree_include: artifact.exp_tree_include,
            exp_tree_exclude: artifact.exp_tree_exclude,
            subpopulations: artifact.subpopulations,
            base_elements: artifact.base_elements,
            instances: artifact.instances,
            saved_fields: artifact.saved_fields,
            revision: artifact.revision,
            created_by: artifact.created_by,
            created_at: artifact.created_at,
            updated_by: artifact.updated_by,
            updated_at: artifact.updated_at,
        }
    }
}

/// Listing entry for stored artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub id: Id,
    pub name: String,
    pub version: String,
    pub revision: Option<String>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

/// Input model for creating an artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewArtifact {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Artifact {
    /// Empty artifact whose inclusion and exclusion trees are each a single
    /// group instantiated from `root_template`
    pub fn new(name: &str, root_template: &TemplateDefinition, user: &UserContext) -> Self {
        let include = TemplateInstance::from_template(root_template);
        let exclude = TemplateInstance::from_template(root_template);
        let now = Utc::now();

        let mut instances = BTreeMap::new();
        let exp_tree_include = include.unique_id.clone();
        let exp_tree_exclude = exclude.unique_id.clone();
        instances.insert(include.unique_id.clone(), include);
        instances.insert(exclude.unique_id.clone(), exclude);

        Artifact {
            id: generate_id(),
            name: name.to_string(),
            version: "1".to_string(),
            description: None,
            exp_tree_include,
            exp_tree_exclude,
            subpopulations: Vec::new(),
            base_elements: Vec::new(),
            instances,
            parents: HashMap::new(),
            usages: UsageIndex::default(),
            saved_fields: BTreeMap::new(),
            revision: None,
            created_by: user.user_id.clone(),
            created_at: now,
            updated_by: user.user_id.clone(),
            updated_at: now,
        }
    }

    pub fn from_new(new: NewArtifact, root_template: &TemplateDefinition, user: &UserContext) -> Self {
        let mut artifact = Self::new(&new.name, root_template, user);
        if let Some(version) = new.version {
            artifact.version = version;
        }
        artifact.description = new.description;
        artifact
    }

    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
            revision: self.revision.clone(),
            updated_by: self.updated_by.clone(),
            updated_at: self.updated_at,
        }
    }

    pub fn instance(&self, unique_id: &str) -> Option<&TemplateInstance> {
        self.instances.get(unique_id)
    }

    /// Like `instance`, but a missing node is an error
    pub fn require(&self, unique_id: &str) -> AuthoringResult<&TemplateInstance> {
        self.instances
            .get(unique_id)
            .ok_or_else(|| AuthoringError::InstanceNotFound(unique_id.to_string()))
    }

    pub(crate) fn require_mut(&mut self, unique_id: &str) -> AuthoringResult<&mut TemplateInstance> {
        self.instances
            .get_mut(unique_id)
            .ok_or_else(|| AuthoringError::InstanceNotFound(unique_id.to_string()))
    }

    pub fn instances(&self) -> impl Iterator<Item = &TemplateInstance> {
        self.instances.values()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn parent_of(&self, unique_id: &str) -> Option<&Id> {
        self.parents.get(unique_id)
    }

    pub fn children(&self, unique_id: &str) -> &[Id] {
        self.instances
            .get(unique_id)
            .map(|node| node.child_instances.as_slice())
            .unwrap_or(&[])
    }

    /// Ancestors of a node, nearest first
    pub fn ancestors(&self, unique_id: &str) -> Vec<Id> {
        let mut ancestors = Vec::new();
        let mut seen = BTreeSet::new();
        let mut current = self.parents.get(unique_id);
        // stops on a parent cycle, which check_integrity reports
        while let Some(parent) = current {
            if !seen.insert(parent) {
                break;
            }
            ancestors.push(parent.clone());
            current = self.parents.get(parent);
        }
        ancestors
    }

    /// The node and all of its descendants, in pre-order
    pub fn subtree(&self, unique_id: &str) -> Vec<Id> {
        let mut ordered = Vec::new();
        let mut seen = BTreeSet::new();
        let mut stack = vec![unique_id.to_string()];
        while let Some(id) = stack.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Some(node) = self.instances.get(&id) {
                stack.extend(node.child_instances.iter().rev().cloned());
                ordered.push(id);
            }
        }
        ordered
    }

    pub fn is_descendant_of(&self, unique_id: &str, ancestor: &str) -> bool {
        self.ancestors(unique_id).iter().any(|a| a == ancestor)
    }

    /// Whether the node heads one of the artifact's trees
    pub fn is_tree_root(&self, unique_id: &str) -> bool {
        unique_id == self.exp_tree_include
            || unique_id == self.exp_tree_exclude
            || self.subpopulations.iter().any(|s| s.root == unique_id)
            || self.base_elements.iter().any(|b| b == unique_id)
    }

    pub fn tree_of(&self, unique_id: &str) -> Option<TreeName> {
        if !self.instances.contains_key(unique_id) {
            return None;
        }
        let top = self
            .ancestors(unique_id)
            .pop()
            .unwrap_or_else(|| unique_id.to_string());

        if top == self.exp_tree_include {
            Some(TreeName::ExpTreeInclude)
        } else if top == self.exp_tree_exclude {
            Some(TreeName::ExpTreeExclude)
        } else if self.base_elements.contains(&top) {
            Some(TreeName::BaseElements)
        } else {
            self.subpopulations
                .iter()
                .find(|s| s.root == top)
                .map(|s| TreeName::Subpopulation(s.unique_id.clone()))
        }
    }

    /// Check that a node lives in the tree the caller named
    pub fn ensure_in_tree(&self, unique_id: &str, tree: &TreeName) -> AuthoringResult<()> {
        self.require(unique_id)?;
        match self.tree_of(unique_id) {
            Some(actual) if &actual == tree => Ok(()),
            _ => Err(AuthoringError::WrongTree {
                unique_id: unique_id.to_string(),
                tree: tree.to_string(),
            }),
        }
    }

    pub fn used_by(&self, unique_id: &str) -> Vec<Id> {
        self.usages.used_by(unique_id)
    }

    pub fn is_in_use(&self, unique_id: &str) -> bool {
        self.usages.is_in_use(unique_id)
    }

    /// Record that `use_id` references `definition_id`
    pub fn register_use(&mut self, definition_id: &str, use_id: &str) -> AuthoringResult<()> {
        self.require(definition_id)?;
        self.require(use_id)?;
        self.usages.register(definition_id, use_id);
        Ok(())
    }

    pub(crate) fn unregister_use(&mut self, definition_id: &str, use_id: &str) {
        self.usages.unregister(definition_id, use_id);
    }

    /// Fields of a node as of the last save, if it has been saved since creation
    pub fn saved_fields(&self, unique_id: &str) -> Option<&[Field]> {
        self.saved_fields.get(unique_id).map(Vec::as_slice)
    }

    /// Insert a node under `parent_id` at `index` (appends when `None`)
    pub(crate) fn insert_child(
        &mut self,
        parent_id: &str,
        node: TemplateInstance,
        index: Option<usize>,
    ) -> AuthoringResult<()> {
        let node_id = node.unique_id.clone();
        let parent = self.require_mut(parent_id)?;
        let position = index
            .unwrap_or(parent.child_instances.len())
            .min(parent.child_instances.len());
        parent.child_instances.insert(position, node_id.clone());
        self.parents.insert(node_id.clone(), parent_id.to_string());
        self.adopt(node);
        Ok(())
    }

    pub(crate) fn insert_base_element(&mut self, node: TemplateInstance) {
        self.base_elements.push(node.unique_id.clone());
        self.adopt(node);
    }

    pub(crate) fn insert_subpopulation(&mut self, name: &str, root: TemplateInstance) -> Id {
        let subpopulation = Subpopulation {
            unique_id: generate_id(),
            name: name.to_string(),
            root: root.unique_id.clone(),
        };
        let id = subpopulation.unique_id.clone();
        self.subpopulations.push(subpopulation);
        self.adopt(root);
        id
    }

    fn adopt(&mut self, node: TemplateInstance) {
        if let Some(referent) = node.base_element_reference() {
            self.usages.register(referent, &node.unique_id);
        }
        self.instances.insert(node.unique_id.clone(), node);
    }

    /// Unlink a node from its parent (or from the base element list) without
    /// dropping it. Returns the index it held.
    pub(crate) fn detach(&mut self, unique_id: &str) -> AuthoringResult<usize> {
        if let Some(parent_id) = self.parents.remove(unique_id) {
            let parent = self.require_mut(&parent_id)?;
            let index = parent
                .child_instances
                .iter()
                .position(|c| c == unique_id)
                .ok_or_else(|| AuthoringError::InstanceNotFound(unique_id.to_string()))?;
            parent.child_instances.remove(index);
            return Ok(index);
        }
        if let Some(index) = self.base_elements.iter().position(|b| b == unique_id) {
            self.base_elements.remove(index);
            return Ok(index);
        }
        if let Some(index) = self.subpopulations.iter().position(|s| s.root == unique_id) {
            self.subpopulations.remove(index);
            return Ok(index);
        }
        Err(AuthoringError::InvalidOperation(format!(
            "instance '{}' is a tree root and cannot be detached",
            unique_id
        )))
    }

    /// Re-attach a detached node under a new parent
    pub(crate) fn attach(&mut self, unique_id: &str, parent_id: &str, index: usize) -> AuthoringResult<()> {
        self.require(unique_id)?;
        let parent = self.require_mut(parent_id)?;
        let position = index.min(parent.child_instances.len());
        parent.child_instances.insert(position, unique_id.to_string());
        self.parents.insert(unique_id.to_string(), parent_id.to_string());
        Ok(())
    }

    /// Remove a node and everything it owns. Back-links held by removed use
    /// nodes are dropped from the usage index.
    pub(crate) fn remove_subtree(&mut self, unique_id: &str) -> AuthoringResult<Vec<TemplateInstance>> {
        let ids = self.subtree(unique_id);
        self.detach(unique_id)?;

        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            self.parents.remove(&id);
            self.saved_fields.remove(&id);
            if let Some(node) = self.instances.remove(&id) {
                if let Some(referent) = node.base_element_reference() {
                    self.usages.unregister(referent, &node.unique_id);
                }
                removed.push(node);
            }
        }
        Ok(removed)
    }

    /// Point a use node at a different referent, keeping the usage index in step
    pub(crate) fn retarget_use(&mut self, use_id: &str, new_referent: Option<&str>) {
        if let Some(old) = self.instances.get(use_id).and_then(|n| n.base_element_reference()).cloned() {
            self.usages.unregister(&old, use_id);
        }
        if let Some(new_referent) = new_referent {
            self.usages.register(new_referent, use_id);
        }
    }

    /// Record the save baseline and stamp the revision
    pub fn mark_saved(&mut self, user: &UserContext) {
        self.saved_fields = self
            .instances
            .values()
            .map(|node| (node.unique_id.clone(), node.fields.clone()))
            .collect();
        self.updated_by = user.user_id.clone();
        self.updated_at = Utc::now();
        self.revision = Some(self.content_hash());
    }

    /// SHA-256 over the trees and nodes, independent of audit fields
    pub fn content_hash(&self) -> String {
        let content = serde_json::json!({
            "expTreeInclude": self.exp_tree_include,
            "expTreeExclude": self.exp_tree_exclude,
            "subpopulations": self.subpopulations,
            "baseElements": self.base_elements,
            "instances": self.instances,
        });
        let mut hasher = Sha256::new();
        hasher.update(content.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    fn rebuild_indexes(&mut self) {
        self.parents.clear();
        self.usages = UsageIndex::default();
        for node in self.instances.values() {
            for child in &node.child_instances {
                self.parents.insert(child.clone(), node.unique_id.clone());
            }
            if let Some(referent) = node.base_element_reference() {
                self.usages.register(referent, &node.unique_id);
            }
        }
    }

    /// Verify the arena is a forest and the derived indexes match the nodes
    pub fn check_integrity(&self) -> AuthoringResult<()> {
        let mut seen = BTreeSet::new();
        for node in self.instances.values() {
            for child in &node.child_instances {
                if !self.instances.contains_key(child) {
                    return Err(AuthoringError::InstanceNotFound(child.clone()));
                }
                if !seen.insert(child.clone()) {
                    return Err(AuthoringError::InvalidOperation(format!(
                        "instance '{}' has more than one parent",
                        child
                    )));
                }
                if self.parents.get(child) != Some(&node.unique_id) {
                    return Err(AuthoringError::InvalidOperation(format!(
                        "parent index out of date for '{}'",
                        child
                    )));
                }
            }
            if self.ancestors(&node.unique_id).contains(&node.unique_id) {
                return Err(AuthoringError::InvalidOperation(format!(
                    "instance '{}' is its own ancestor",
                    node.unique_id
                )));
            }
        }

        let mut rebuilt = self.clone();
        rebuilt.rebuild_indexes();
        if rebuilt.usages != self.usages {
            return Err(AuthoringError::InvalidOperation(
                "usage index out of date".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        return_types, FieldDefinition, FieldType, FieldValue, InstanceKind, ELEMENT_NAME_FIELD,
    };

    fn and_template() -> TemplateDefinition {
        TemplateDefinition {
            id: "And".to_string(),
            name: "And".to_string(),
            kind: InstanceKind::Conjunction,
            return_type: return_types::BOOLEAN.to_string(),
            infer_return_type: false,
            fields: vec![FieldDefinition::new(ELEMENT_NAME_FIELD, "Group Name", FieldType::Text)],
        }
    }

    fn observation_template() -> TemplateDefinition {
        TemplateDefinition {
            id: "GenericObservation".to_string(),
            name: "Observation".to_string(),
            kind: InstanceKind::Element,
            return_type: return_types::OBSERVATIONS.to_string(),
            infer_return_type: false,
            fields: vec![FieldDefinition::new(ELEMENT_NAME_FIELD, "Element Name", FieldType::Text)],
        }
    }

    #[test]
    fn test_new_artifact_has_two_roots() {
        let artifact = Artifact::new("Test", &and_template(), &UserContext::system());

        assert_eq!(artifact.len(), 2);
        assert_eq!(artifact.tree_of(&artifact.exp_tree_include), Some(TreeName::ExpTreeInclude));
        assert_eq!(artifact.tree_of(&artifact.exp_tree_exclude), Some(TreeName::ExpTreeExclude));
        assert!(artifact.is_tree_root(&artifact.exp_tree_include));
        assert!(artifact.check_integrity().is_ok());
    }

    #[test]
    fn test_insert_and_remove_subtree() {
        let mut artifact = Artifact::new("Test", &and_template(), &UserContext::system());
        let root = artifact.exp_tree_include.clone();

        let group = TemplateInstance::from_template(&and_template());
        let group_id = group.unique_id.clone();
        artifact.insert_child(&root, group, None).unwrap();

        let leaf = TemplateInstance::from_template(&observation_template());
        let leaf_id = leaf.unique_id.clone();
        artifact.insert_child(&group_id, leaf, None).unwrap();

        assert_eq!(artifact.ancestors(&leaf_id), vec![group_id.clone(), root.clone()]);
        assert_eq!(artifact.subtree(&group_id), vec![group_id.clone(), leaf_id.clone()]);
        assert_eq!(artifact.tree_of(&leaf_id), Some(TreeName::ExpTreeInclude));

        let removed = artifact.remove_subtree(&group_id).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(artifact.instance(&leaf_id).is_none());
        assert!(artifact.children(&root).is_empty());
        assert!(artifact.check_integrity().is_ok());
    }

    #[test]
    fn test_cyclic_body_refused_on_load() {
        let mut artifact = Artifact::new("Test", &and_template(), &UserContext::system());
        let root = artifact.exp_tree_include.clone();
        let group = TemplateInstance::from_template(&and_template());
        let group_id = group.unique_id.clone();
        artifact.insert_child(&root, group, None).unwrap();

        let mut body = serde_json::to_value(&artifact).unwrap();
        body["instances"][&group_id]["childInstances"] = serde_json::json!([root.clone()]);

        let err = serde_json::from_value::<Artifact>(body).unwrap_err();
        assert!(err.to_string().contains("own ancestor"));

        // walks stay bounded even on an arena that was never validated
        artifact.parents.insert(root.clone(), group_id.clone());
        assert_eq!(artifact.ancestors(&group_id), vec![root.clone(), group_id.clone()]);
        assert!(artifact.check_integrity().is_err());
    }

    #[test]
    fn test_usage_index_rebuilt_after_round_trip() {
        let mut artifact = Artifact::new("Test", &and_template(), &UserContext::system());
        let mut definition = TemplateInstance::from_template(&observation_template());
        definition.field_mut(ELEMENT_NAME_FIELD).unwrap().value = Some(FieldValue::text("A"));
        let definition_id = definition.unique_id.clone();
        let use_node = TemplateInstance::use_of(&definition, return_types::OBSERVATIONS.to_string());
        let use_id = use_node.unique_id.clone();

        artifact.insert_base_element(definition);
        let root = artifact.exp_tree_include.clone();
        artifact.insert_child(&root, use_node, None).unwrap();
        assert_eq!(artifact.used_by(&definition_id), vec![use_id.clone()]);

        let json = serde_json::to_string(&artifact).unwrap();
        assert!(!json.contains("usages"));
        let restored: Artifact = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.used_by(&definition_id), vec![use_id]);
        assert_eq!(restored, artifact);
    }

    #[test]
    fn test_removing_use_drops_back_link() {
        let mut artifact = Artifact::new("Test", &and_template(), &UserContext::system());
        let definition = TemplateInstance::from_template(&observation_template());
        let definition_id = definition.unique_id.clone();
        let use_node = TemplateInstance::use_of(&definition, return_types::OBSERVATIONS.to_string());
        let use_id = use_node.unique_id.clone();
        artifact.insert_base_element(definition);
        let root = artifact.exp_tree_include.clone();
        artifact.insert_child(&root, use_node, None).unwrap();

        artifact.remove_subtree(&use_id).unwrap();

        assert!(!artifact.is_in_use(&definition_id));
        assert!(artifact.check_integrity().is_ok());
    }

    #[test]
    fn test_mark_saved_records_baseline_and_revision() {
        let mut artifact = Artifact::new("Test", &and_template(), &UserContext::system());
        let root = artifact.exp_tree_include.clone();
        assert!(artifact.saved_fields(&root).is_none());

        artifact.mark_saved(&UserContext::default_user());

        assert!(artifact.saved_fields(&root).is_some());
        assert_eq!(artifact.updated_by, "dev-user");
        assert_eq!(artifact.revision.as_deref(), Some(artifact.content_hash().as_str()));
        assert_eq!(artifact.revision.as_ref().map(|r| r.len()), Some(64));
    }

    #[test]
    fn test_ensure_in_tree() {
        let artifact = Artifact::new("Test", &and_template(), &UserContext::system());
        let root = artifact.exp_tree_include.clone();

        assert!(artifact.ensure_in_tree(&root, &TreeName::ExpTreeInclude).is_ok());
        assert!(matches!(
            artifact.ensure_in_tree(&root, &TreeName::BaseElements),
            Err(AuthoringError::WrongTree { .. })
        ));
    }
}
