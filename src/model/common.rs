use uuid::Uuid;

pub type Id = String;

/// Name of a clinical data type flowing between nodes and modifiers,
/// e.g. `observations`, `observation`, `boolean`
pub type ReturnType = String;

/// Field holding the user-visible name of an element
pub const ELEMENT_NAME_FIELD: &str = "element_name";

/// Field holding a base-element use's link to its referent
pub const BASE_ELEMENT_REFERENCE_FIELD: &str = "baseElementReference";

pub const BASE_ELEMENT_REFERENCE_TYPE: &str = "Base Element";

pub mod return_types {
    pub const BOOLEAN: &str = "boolean";
    pub const INTEGER: &str = "integer";
    pub const OBSERVATIONS: &str = "observations";
    pub const OBSERVATION: &str = "observation";
    pub const CONDITIONS: &str = "conditions";
    pub const CONDITION: &str = "condition";
    pub const MEDICATIONS: &str = "medications";
    pub const MEDICATION: &str = "medication";
    pub const PROCEDURES: &str = "procedures";
    pub const PROCEDURE: &str = "procedure";
    pub const ANY: &str = "any";

    /// The list types every "element list" modifier accepts
    pub const ELEMENT_LISTS: [&str; 4] = [OBSERVATIONS, CONDITIONS, MEDICATIONS, PROCEDURES];
}

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// Unique id for a freshly instantiated node, prefixed with its template id
pub fn generate_unique_id(template_id: &str) -> Id {
    format!("{}-{}", template_id, Uuid::new_v4().simple())
}
