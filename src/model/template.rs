use crate::model::{FieldValue, Id, ReturnType};
use serde::{Deserialize, Serialize};

/// Structural role of a node in an expression tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceKind {
    /// Leaf clinical-data query (observation, condition, ...)
    Element,
    /// Boolean group (And / Or)
    Conjunction,
    /// List group (Union / Intersect); its type follows its children
    ListGroup,
    Case,
    If,
    Comparison,
    /// Named artifact parameter
    Parameter,
}

impl InstanceKind {
    /// Whether nodes of this kind own child instances
    pub fn is_group(&self) -> bool {
        matches!(
            self,
            InstanceKind::Conjunction | InstanceKind::ListGroup | InstanceKind::Case | InstanceKind::If
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Textarea,
    Number,
    Boolean,
    Date,
    ValueSets,
    Codes,
    Reference,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Initial value copied into new instances
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<FieldValue>,
}

impl FieldDefinition {
    pub fn new(id: &str, name: &str, field_type: FieldType) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            field_type,
            value: None,
        }
    }

    pub fn with_value(mut self, value: FieldValue) -> Self {
        self.value = Some(value);
        self
    }
}

/// Immutable catalog entry that nodes are instantiated from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDefinition {
    pub id: Id,
    pub name: String,
    pub kind: InstanceKind,

    /// Declared return type. For templates that infer their type this is
    /// the fallback used when children disagree or are absent.
    pub return_type: ReturnType,

    #[serde(default)]
    pub infer_return_type: bool,

    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateCategory {
    pub id: Id,
    pub name: String,
    pub entries: Vec<TemplateDefinition>,
}
