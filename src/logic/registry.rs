use crate::error::{AuthoringError, AuthoringResult};
use crate::model::{Id, InstanceKind, ModifierDefinition, TemplateCategory, TemplateDefinition};
use std::collections::HashMap;
use std::path::Path;

/// Immutable catalog of modifier definitions, built once at startup and
/// shared by reference with the engines
#[derive(Debug, Clone)]
pub struct ModifierRegistry {
    modifiers: Vec<ModifierDefinition>,
    by_id: HashMap<Id, usize>,
}

impl ModifierRegistry {
    pub fn new(modifiers: Vec<ModifierDefinition>) -> AuthoringResult<Self> {
        let mut by_id = HashMap::with_capacity(modifiers.len());
        for (index, modifier) in modifiers.iter().enumerate() {
            if modifier.input_types.is_empty() {
                return Err(AuthoringError::Catalog(format!(
                    "modifier '{}' declares no input types",
                    modifier.id
                )));
            }
            if by_id.insert(modifier.id.clone(), index).is_some() {
                return Err(AuthoringError::Catalog(format!(
                    "duplicate modifier id '{}'",
                    modifier.id
                )));
            }
        }
        Ok(Self { modifiers, by_id })
    }

    /// Load definitions from a JSON array on disk
    pub fn from_json_file(path: &Path) -> AuthoringResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AuthoringError::Catalog(format!("cannot read {}: {}", path.display(), e))
        })?;
        let modifiers: Vec<ModifierDefinition> = serde_json::from_str(&content).map_err(|e| {
            AuthoringError::Catalog(format!("invalid modifier list {}: {}", path.display(), e))
        })?;
        Self::new(modifiers)
    }

    pub fn lookup_by_id(&self, id: &str) -> Option<&ModifierDefinition> {
        self.by_id.get(id).map(|&index| &self.modifiers[index])
    }

    pub fn require(&self, id: &str) -> AuthoringResult<&ModifierDefinition> {
        self.lookup_by_id(id)
            .ok_or_else(|| AuthoringError::UnknownModifier(id.to_string()))
    }

    /// Modifiers accepting `input_type`, in declaration order
    pub fn by_input_type(&self, input_type: &str) -> Vec<&ModifierDefinition> {
        self.modifiers
            .iter()
            .filter(|m| m.accepts(input_type))
            .collect()
    }

    pub fn all(&self) -> &[ModifierDefinition] {
        &self.modifiers
    }

    pub fn len(&self) -> usize {
        self.modifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
    }
}

/// Template definitions grouped by category. The first conjunction template
/// in declaration order heads new artifact trees.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    categories: Vec<TemplateCategory>,
    by_id: HashMap<Id, (usize, usize)>,
    root_template: (usize, usize),
}

impl TemplateCatalog {
    pub fn new(categories: Vec<TemplateCategory>) -> AuthoringResult<Self> {
        let mut by_id = HashMap::new();
        let mut root_template = None;

        for (c, category) in categories.iter().enumerate() {
            for (t, template) in category.entries.iter().enumerate() {
                if by_id.insert(template.id.clone(), (c, t)).is_some() {
                    return Err(AuthoringError::Catalog(format!(
                        "duplicate template id '{}'",
                        template.id
                    )));
                }
                if root_template.is_none() && template.kind == InstanceKind::Conjunction {
                    root_template = Some((c, t));
                }
            }
        }

        let root_template = root_template.ok_or_else(|| {
            AuthoringError::Catalog("catalog has no conjunction template for tree roots".to_string())
        })?;

        Ok(Self {
            categories,
            by_id,
            root_template,
        })
    }

    pub fn from_json_file(path: &Path) -> AuthoringResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AuthoringError::Catalog(format!("cannot read {}: {}", path.display(), e))
        })?;
        let categories: Vec<TemplateCategory> = serde_json::from_str(&content).map_err(|e| {
            AuthoringError::Catalog(format!("invalid template catalog {}: {}", path.display(), e))
        })?;
        Self::new(categories)
    }

    pub fn lookup(&self, id: &str) -> Option<&TemplateDefinition> {
        self.by_id
            .get(id)
            .map(|&(c, t)| &self.categories[c].entries[t])
    }

    pub fn require(&self, id: &str) -> AuthoringResult<&TemplateDefinition> {
        self.lookup(id)
            .ok_or_else(|| AuthoringError::UnknownTemplate(id.to_string()))
    }

    pub fn root_template(&self) -> &TemplateDefinition {
        let (c, t) = self.root_template;
        &self.categories[c].entries[t]
    }

    pub fn categories(&self) -> &[TemplateCategory] {
        &self.categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::return_types;
    use crate::seed::{default_modifiers, default_templates};

    #[test]
    fn test_lookup_and_menu_order() {
        let registry = ModifierRegistry::new(default_modifiers()).unwrap();

        let exists = registry.lookup_by_id("BooleanExists").unwrap();
        assert_eq!(exists.return_type, return_types::BOOLEAN);
        assert!(registry.lookup_by_id("NoSuchModifier").is_none());

        let menu: Vec<&str> = registry
            .by_input_type(return_types::OBSERVATIONS)
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        let declared: Vec<&str> = registry
            .all()
            .iter()
            .filter(|m| m.accepts(return_types::OBSERVATIONS))
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(menu, declared);
        assert!(menu.contains(&"VerifiedObservation"));
        assert!(menu.contains(&"BooleanExists"));
    }

    #[test]
    fn test_duplicate_modifier_rejected() {
        let mut modifiers = default_modifiers();
        modifiers.push(modifiers[0].clone());

        assert!(matches!(
            ModifierRegistry::new(modifiers),
            Err(AuthoringError::Catalog(_))
        ));
    }

    #[test]
    fn test_template_catalog_root() {
        let catalog = TemplateCatalog::new(default_templates()).unwrap();

        assert_eq!(catalog.root_template().kind, InstanceKind::Conjunction);
        assert!(catalog.lookup("GenericObservation").is_some());
        assert!(matches!(
            catalog.require("Missing"),
            Err(AuthoringError::UnknownTemplate(_))
        ));
    }

    #[test]
    fn test_catalog_without_conjunction_rejected() {
        let categories: Vec<TemplateCategory> = default_templates()
            .into_iter()
            .map(|mut c| {
                c.entries.retain(|t| t.kind != InstanceKind::Conjunction);
                c
            })
            .collect();

        assert!(TemplateCatalog::new(categories).is_err());
    }
}
