use crate::model::{Id, ReturnType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Extra user-editable parameters of a modifier (e.g. look-back `value` + `unit`)
pub type ModifierValues = BTreeMap<String, serde_json::Value>;

/// Catalog entry describing a chainable unary operator on a return type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifierDefinition {
    pub id: Id,
    pub name: String,

    /// Return types this modifier may consume
    pub input_types: Vec<ReturnType>,

    /// Return type produced
    pub return_type: ReturnType,

    /// Template of extra parameters; keys are the only accepted value names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<ModifierValues>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cql_template: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cql_library_function: Option<String>,
}

impl ModifierDefinition {
    pub fn accepts(&self, input_type: &str) -> bool {
        self.input_types.iter().any(|t| t == input_type)
    }

    /// True when applying this modifier to `input_type` leaves the type unchanged
    pub fn preserves(&self, input_type: &str) -> bool {
        self.accepts(input_type) && self.return_type == input_type
    }

    /// Build the record stored on a node when this modifier is applied
    pub fn to_applied(&self) -> AppliedModifier {
        AppliedModifier {
            id: self.id.clone(),
            name: self.name.clone(),
            input_types: self.input_types.clone(),
            return_type: self.return_type.clone(),
            values: self.values.clone(),
        }
    }
}

/// A modifier as applied on a node. Carries its own declared types so a chain
/// can be checked without consulting the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedModifier {
    pub id: Id,
    pub name: String,
    pub input_types: Vec<ReturnType>,
    pub return_type: ReturnType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<ModifierValues>,
}

impl AppliedModifier {
    pub fn accepts(&self, input_type: &str) -> bool {
        self.input_types.iter().any(|t| t == input_type)
    }
}
