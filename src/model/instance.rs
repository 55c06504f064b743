use crate::model::{
    generate_unique_id, AppliedModifier, FieldDefinition, FieldType, Id, InstanceKind, ReturnType,
    TemplateDefinition, BASE_ELEMENT_REFERENCE_FIELD, BASE_ELEMENT_REFERENCE_TYPE,
    ELEMENT_NAME_FIELD,
};
use serde::{Deserialize, Serialize};

/// A node of an expression tree, instantiated from a template definition.
/// Children are held by id; the owning `Artifact` is the arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateInstance {
    pub unique_id: Id,
    pub template_id: Id,
    pub name: String,
    pub kind: InstanceKind,

    /// Intrinsic type from the template, before any modifier is applied.
    /// Uses and inferring groups derive theirs at resolution time instead.
    pub base_return_type: ReturnType,

    #[serde(default)]
    pub infer_return_type: bool,

    #[serde(default)]
    pub fields: Vec<Field>,

    #[serde(default)]
    pub modifiers: Vec<AppliedModifier>,

    #[serde(default)]
    pub child_instances: Vec<Id>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<FieldValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    ValueSets(Vec<ValueSet>),
    Codes(Vec<Code>),
    Reference(ElementReference),
    Json(serde_json::Value),
}

impl FieldValue {
    pub fn text(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }

    /// Whether this value may be stored in a field of the given type
    pub fn fits(&self, field_type: FieldType) -> bool {
        match (self, field_type) {
            (FieldValue::Json(_), _) => true,
            (FieldValue::Text(_), FieldType::Text | FieldType::Textarea | FieldType::Date) => true,
            (FieldValue::Number(_), FieldType::Number) => true,
            (FieldValue::Boolean(_), FieldType::Boolean) => true,
            (FieldValue::ValueSets(_), FieldType::ValueSets) => true,
            (FieldValue::Codes(_), FieldType::Codes) => true,
            (FieldValue::Reference(_), FieldType::Reference) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementReference {
    pub id: Id,
    #[serde(rename = "type")]
    pub reference_type: String,
}

impl ElementReference {
    pub fn base_element(id: &str) -> Self {
        Self {
            id: id.to_string(),
            reference_type: BASE_ELEMENT_REFERENCE_TYPE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSet {
    pub name: String,
    pub oid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSystem {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Code {
    pub code: String,
    pub code_system: CodeSystem,
    #[serde(default)]
    pub display: String,
}

/// A single field value change requested by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEdit {
    pub field_id: String,
    pub value: Option<FieldValue>,
}

impl FieldEdit {
    pub fn set(field_id: &str, value: FieldValue) -> Self {
        Self {
            field_id: field_id.to_string(),
            value: Some(value),
        }
    }

    pub fn clear(field_id: &str) -> Self {
        Self {
            field_id: field_id.to_string(),
            value: None,
        }
    }
}

impl From<&FieldDefinition> for Field {
    fn from(def: &FieldDefinition) -> Self {
        Field {
            id: def.id.clone(),
            name: def.name.clone(),
            field_type: def.field_type,
            value: def.value.clone(),
        }
    }
}

impl TemplateInstance {
    /// Deep copy of the template with a fresh unique id
    pub fn from_template(template: &TemplateDefinition) -> Self {
        Self {
            unique_id: generate_unique_id(&template.id),
            template_id: template.id.clone(),
            name: template.name.clone(),
            kind: template.kind,
            base_return_type: template.return_type.clone(),
            infer_return_type: template.infer_return_type,
            fields: template.fields.iter().map(Field::from).collect(),
            modifiers: Vec::new(),
            child_instances: Vec::new(),
        }
    }

    /// A use of `referent`: same shape and field values, a reference field
    /// pointing back, and no modifiers or children of its own
    pub fn use_of(referent: &TemplateInstance, referent_type: ReturnType) -> Self {
        let mut fields: Vec<Field> = referent
            .fields
            .iter()
            .filter(|f| f.id != BASE_ELEMENT_REFERENCE_FIELD)
            .cloned()
            .collect();
        let name = referent.display_name();
        match fields.iter_mut().find(|f| f.id == ELEMENT_NAME_FIELD) {
            Some(field) => field.value = Some(FieldValue::Text(name)),
            None => fields.insert(
                0,
                Field {
                    id: ELEMENT_NAME_FIELD.to_string(),
                    name: "Element Name".to_string(),
                    field_type: FieldType::Text,
                    value: Some(FieldValue::Text(name)),
                },
            ),
        }
        fields.push(Field {
            id: BASE_ELEMENT_REFERENCE_FIELD.to_string(),
            name: "Base Element".to_string(),
            field_type: FieldType::Reference,
            value: Some(FieldValue::Reference(ElementReference::base_element(
                &referent.unique_id,
            ))),
        });

        Self {
            unique_id: generate_unique_id(&referent.template_id),
            template_id: referent.template_id.clone(),
            name: referent.name.clone(),
            kind: InstanceKind::Element,
            base_return_type: referent_type,
            infer_return_type: false,
            fields,
            modifiers: Vec::new(),
            child_instances: Vec::new(),
        }
    }

    pub fn field(&self, field_id: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == field_id)
    }

    pub fn field_mut(&mut self, field_id: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.id == field_id)
    }

    pub fn element_name(&self) -> Option<&str> {
        match self.field(ELEMENT_NAME_FIELD)?.value.as_ref()? {
            FieldValue::Text(name) if !name.is_empty() => Some(name.as_str()),
            _ => None,
        }
    }

    /// Element name if set, template name otherwise
    pub fn display_name(&self) -> String {
        self.element_name()
            .map(str::to_string)
            .unwrap_or_else(|| self.name.clone())
    }

    /// Id of the node this instance is a use of, if any
    pub fn base_element_reference(&self) -> Option<&Id> {
        match self.field(BASE_ELEMENT_REFERENCE_FIELD)?.value.as_ref()? {
            FieldValue::Reference(reference) => Some(&reference.id),
            _ => None,
        }
    }

    pub fn is_base_element_use(&self) -> bool {
        self.base_element_reference().is_some()
    }

    /// Fields that describe what the node queries, i.e. everything but its
    /// name and its reference link
    pub fn content_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields
            .iter()
            .filter(|f| f.id != ELEMENT_NAME_FIELD && f.id != BASE_ELEMENT_REFERENCE_FIELD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::return_types;

    fn observation_template() -> TemplateDefinition {
        TemplateDefinition {
            id: "GenericObservation".to_string(),
            name: "Observation".to_string(),
            kind: InstanceKind::Element,
            return_type: return_types::OBSERVATIONS.to_string(),
            infer_return_type: false,
            fields: vec![
                FieldDefinition::new(ELEMENT_NAME_FIELD, "Element Name", FieldType::Text),
                FieldDefinition::new("comment", "Comment", FieldType::Textarea),
            ],
        }
    }

    #[test]
    fn test_from_template_copies_fields_with_fresh_id() {
        let template = observation_template();
        let a = TemplateInstance::from_template(&template);
        let b = TemplateInstance::from_template(&template);

        assert_ne!(a.unique_id, b.unique_id);
        assert_eq!(a.template_id, "GenericObservation");
        assert_eq!(a.fields.len(), 2);
        assert!(a.modifiers.is_empty());
        assert_eq!(a.display_name(), "Observation");
    }

    #[test]
    fn test_use_of_links_back_and_keeps_name() {
        let mut definition = TemplateInstance::from_template(&observation_template());
        definition.field_mut(ELEMENT_NAME_FIELD).unwrap().value = Some(FieldValue::text("A"));

        let use_node = TemplateInstance::use_of(&definition, return_types::OBSERVATIONS.to_string());

        assert_eq!(use_node.base_element_reference(), Some(&definition.unique_id));
        assert_eq!(use_node.element_name(), Some("A"));
        assert!(use_node.is_base_element_use());
        assert!(!definition.is_base_element_use());
        assert_eq!(
            use_node.content_fields().collect::<Vec<_>>(),
            definition.content_fields().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_field_value_fits_declared_type() {
        assert!(FieldValue::text("x").fits(FieldType::Textarea));
        assert!(FieldValue::Number(3.0).fits(FieldType::Number));
        assert!(!FieldValue::Number(3.0).fits(FieldType::Text));
        assert!(FieldValue::Json(serde_json::json!({"a": 1})).fits(FieldType::Codes));
        assert!(!FieldValue::ValueSets(vec![]).fits(FieldType::Codes));
    }
}
