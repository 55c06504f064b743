use crate::model::{
    return_types, FieldDefinition, FieldType, InstanceKind, ModifierDefinition, ModifierValues,
    TemplateCategory, TemplateDefinition, ELEMENT_NAME_FIELD,
};

/// Helper to declare a modifier without extra values
fn modifier(
    id: &str,
    name: &str,
    input_types: &[&str],
    return_type: &str,
    cql_template: Option<&str>,
    cql_library_function: Option<&str>,
) -> ModifierDefinition {
    ModifierDefinition {
        id: id.to_string(),
        name: name.to_string(),
        input_types: input_types.iter().map(|t| t.to_string()).collect(),
        return_type: return_type.to_string(),
        values: None,
        cql_template: cql_template.map(str::to_string),
        cql_library_function: cql_library_function.map(str::to_string),
    }
}

/// Value template where every declared key starts unset
fn empty_values(keys: &[&str]) -> ModifierValues {
    keys.iter()
        .map(|k| (k.to_string(), serde_json::Value::Null))
        .collect()
}

fn with_values(mut definition: ModifierDefinition, keys: &[&str]) -> ModifierDefinition {
    definition.values = Some(empty_values(keys));
    definition
}

fn base(id: &str, name: &str, input: &str, function: &str) -> ModifierDefinition {
    modifier(id, name, &[input], input, Some("BaseModifier"), Some(function))
}

fn look_back(id: &str, input: &str) -> ModifierDefinition {
    with_values(
        modifier(id, "Look Back", &[input], input, Some("twoArgumentModifier"), Some("LookBack")),
        &["value", "unit"],
    )
}

fn most_recent(id: &str, input: &str, output: &str) -> ModifierDefinition {
    modifier(id, "Most Recent", &[input], output, Some("BaseModifier"), Some("MostRecent"))
}

/// Built-in modifier list, in menu order
pub fn default_modifiers() -> Vec<ModifierDefinition> {
    use return_types::*;

    vec![
        // observations
        base("VerifiedObservation", "Verified", OBSERVATIONS, "Verified"),
        with_values(
            modifier("WithUnit", "With Unit", &[OBSERVATIONS], OBSERVATIONS, None, None),
            &["unit"],
        ),
        with_values(
            modifier("ValueComparison", "Value Comparison", &[OBSERVATIONS], OBSERVATIONS, None, None),
            &["min", "max", "minInclusive", "maxInclusive"],
        ),
        // conditions
        base("ConfirmedCondition", "Confirmed", CONDITIONS, "Confirmed"),
        base("ActiveCondition", "Active", CONDITIONS, "Active"),
        // procedures
        base("CompletedProcedure", "Completed", PROCEDURES, "Completed"),
        // medications
        base("ActiveMedication", "Active", MEDICATIONS, "Active"),
        most_recent("MostRecentObservation", OBSERVATIONS, OBSERVATION),
        most_recent("MostRecentCondition", CONDITIONS, CONDITION),
        most_recent("MostRecentMedication", MEDICATIONS, MEDICATION),
        most_recent("MostRecentProcedure", PROCEDURES, PROCEDURE),
        look_back("LookBackObservation", OBSERVATIONS),
        look_back("LookBackCondition", CONDITIONS),
        look_back("LookBackMedication", MEDICATIONS),
        look_back("LookBackProcedure", PROCEDURES),
        modifier("BooleanExists", "Exists", &ELEMENT_LISTS, BOOLEAN, Some("BaseModifier"), Some("Exists")),
        modifier("Count", "Count", &ELEMENT_LISTS, INTEGER, Some("BaseModifier"), Some("Count")),
        modifier("BooleanNot", "Not", &[BOOLEAN], BOOLEAN, Some("BaseModifier"), Some("Not")),
    ]
}

fn name_field(label: &str) -> FieldDefinition {
    FieldDefinition::new(ELEMENT_NAME_FIELD, label, FieldType::Text)
}

fn group(id: &str, name: &str, kind: InstanceKind, return_type: &str, infer: bool) -> TemplateDefinition {
    TemplateDefinition {
        id: id.to_string(),
        name: name.to_string(),
        kind,
        return_type: return_type.to_string(),
        infer_return_type: infer,
        fields: vec![name_field("Group Name")],
    }
}

fn clinical_element(id: &str, name: &str, return_type: &str) -> TemplateDefinition {
    TemplateDefinition {
        id: id.to_string(),
        name: name.to_string(),
        kind: InstanceKind::Element,
        return_type: return_type.to_string(),
        infer_return_type: false,
        fields: vec![
            name_field("Element Name"),
            FieldDefinition::new("comment", "Comment", FieldType::Textarea),
            FieldDefinition::new("valueSets", "Value Sets", FieldType::ValueSets),
            FieldDefinition::new("codes", "Codes", FieldType::Codes),
        ],
    }
}

fn category(id: &str, name: &str, entries: Vec<TemplateDefinition>) -> TemplateCategory {
    TemplateCategory {
        id: id.to_string(),
        name: name.to_string(),
        entries,
    }
}

/// Built-in template catalog. `And` heads new trees.
pub fn default_templates() -> Vec<TemplateCategory> {
    use return_types::*;

    vec![
        category(
            "operations",
            "Operations",
            vec![
                group("And", "And", InstanceKind::Conjunction, BOOLEAN, false),
                group("Or", "Or", InstanceKind::Conjunction, BOOLEAN, false),
                group("Union", "Union", InstanceKind::ListGroup, ANY, true),
                group("Intersect", "Intersect", InstanceKind::ListGroup, ANY, true),
            ],
        ),
        category(
            "observations",
            "Observations",
            vec![clinical_element("GenericObservation", "Observation", OBSERVATIONS)],
        ),
        category(
            "conditions",
            "Conditions",
            vec![clinical_element("GenericCondition", "Condition", CONDITIONS)],
        ),
        category(
            "medications",
            "Medications",
            vec![clinical_element("GenericMedication", "Medication", MEDICATIONS)],
        ),
        category(
            "procedures",
            "Procedures",
            vec![clinical_element("GenericProcedure", "Procedure", PROCEDURES)],
        ),
        category(
            "demographics",
            "Demographics",
            vec![TemplateDefinition {
                id: "AgeRange".to_string(),
                name: "Age Range".to_string(),
                kind: InstanceKind::Comparison,
                return_type: BOOLEAN.to_string(),
                infer_return_type: false,
                fields: vec![
                    name_field("Element Name"),
                    FieldDefinition::new("min_age", "Minimum Age", FieldType::Number),
                    FieldDefinition::new("max_age", "Maximum Age", FieldType::Number),
                ],
            }],
        ),
        category(
            "parameters",
            "Parameters",
            vec![TemplateDefinition {
                id: "Parameter".to_string(),
                name: "Parameter".to_string(),
                kind: InstanceKind::Parameter,
                return_type: BOOLEAN.to_string(),
                infer_return_type: false,
                fields: vec![
                    name_field("Element Name"),
                    FieldDefinition::new("default", "Default Value", FieldType::Boolean),
                ],
            }],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_look_back_declares_value_and_unit() {
        let modifiers = default_modifiers();
        let look_back = modifiers
            .iter()
            .find(|m| m.id == "LookBackCondition")
            .unwrap();
        let values = look_back.values.as_ref().unwrap();

        assert!(values.contains_key("value"));
        assert!(values.contains_key("unit"));
        assert!(look_back.preserves(return_types::CONDITIONS));
    }

    #[test]
    fn test_exists_accepts_every_element_list() {
        let modifiers = default_modifiers();
        let exists = modifiers.iter().find(|m| m.id == "BooleanExists").unwrap();

        for list in return_types::ELEMENT_LISTS {
            assert!(exists.accepts(list));
        }
        assert!(!exists.preserves(return_types::OBSERVATIONS));
    }
}
