use crate::logic::{ModifierRegistry, OperationOutcome, TemplateCatalog, TreeMutator, TreeOperation};
use crate::model::{Artifact, FieldEdit, FieldValue, Id, TreeName, UserContext, ELEMENT_NAME_FIELD};
use crate::seed::{default_modifiers, default_templates};

/// Artifact plus catalogs, driven through the mutator the way a caller would
pub struct Workbench {
    pub registry: ModifierRegistry,
    pub catalog: TemplateCatalog,
    pub artifact: Artifact,
}

impl Workbench {
    pub fn new() -> Self {
        let registry = ModifierRegistry::new(default_modifiers()).unwrap();
        let catalog = TemplateCatalog::new(default_templates()).unwrap();
        let artifact = Artifact::new("Fixture", catalog.root_template(), &UserContext::system());
        Self {
            registry,
            catalog,
            artifact,
        }
    }

    pub fn include_root(&self) -> Id {
        self.artifact.exp_tree_include.clone()
    }

    pub fn try_apply(&mut self, operation: TreeOperation) -> crate::error::AuthoringResult<OperationOutcome> {
        let outcome = TreeMutator::new(&self.registry, &self.catalog).apply(&self.artifact, &operation)?;
        self.artifact = outcome.artifact.clone();
        Ok(outcome)
    }

    pub fn apply(&mut self, operation: TreeOperation) -> OperationOutcome {
        self.try_apply(operation).unwrap()
    }

    pub fn add_child(&mut self, parent_id: &str, template_id: &str) -> Id {
        self.apply(TreeOperation::AddChild {
            parent_id: parent_id.to_string(),
            template_id: template_id.to_string(),
        })
        .created
        .unwrap()
    }

    /// Base element definition with the given element name
    pub fn add_definition(&mut self, template_id: &str, name: &str) -> Id {
        let id = self
            .apply(TreeOperation::AddBaseElement {
                template_id: template_id.to_string(),
            })
            .created
            .unwrap();
        self.apply(TreeOperation::EditInstance {
            tree: TreeName::BaseElements,
            unique_id: id.clone(),
            edits: vec![FieldEdit::set(ELEMENT_NAME_FIELD, FieldValue::text(name))],
            cascade: false,
        });
        id
    }

    pub fn add_use(&mut self, parent_id: Option<&str>, referent_id: &str) -> Id {
        self.apply(TreeOperation::AddBaseElementUse {
            parent_id: parent_id.map(str::to_string),
            referent_id: referent_id.to_string(),
        })
        .created
        .unwrap()
    }

    pub fn add_modifier(&mut self, unique_id: &str, modifier_id: &str) -> crate::error::AuthoringResult<OperationOutcome> {
        self.try_apply(TreeOperation::AddModifier {
            unique_id: unique_id.to_string(),
            modifier_id: modifier_id.to_string(),
        })
    }
}
