use crate::error::{CorepError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

const EMBEDDED_CA1_SCHEMA: &str = include_str!("../data/template_schema.json");

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[schemars(description = "Value is read directly from the scenario")]
    Leaf,

    #[schemars(
        description = "Value is computed from other fields via the derivation formula. A value reported in the scenario is kept and cross-checked against the formula."
    )]
    Derived,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    #[default]
    #[schemars(description = "Integer or decimal amount")]
    Number,

    #[schemars(description = "Free text")]
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Derivation {
    #[schemars(description = "The field equals the sum of the named fields")]
    Sum {
        #[schemars(description = "Names of fields declared earlier in the schema")]
        operands: Vec<String>,
    },
}

impl Derivation {
    pub fn operands(&self) -> &[String] {
        match self {
            Derivation::Sum { operands } => operands,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct TemplateField {
    #[schemars(description = "Unique field name within the template (e.g., 'CET1')")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Template cell code (e.g., 'CA1.010')")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Row number as printed on the template (e.g., '010')")]
    pub line: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Human readable row label")]
    pub label: Option<String>,

    pub kind: FieldKind,

    #[serde(default)]
    pub value_type: ValueType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Scenario key holding this field's value. Defaults to the field name.")]
    pub scenario_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Formula for derived fields. Must be absent for leaf fields.")]
    pub derivation: Option<Derivation>,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    #[schemars(description = "Keywords used to find the excerpts that justify this field")]
    pub rule_tags: BTreeSet<String>,
}

impl TemplateField {
    pub fn scenario_key(&self) -> &str {
        self.scenario_key.as_deref().unwrap_or(&self.name)
    }

    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct TemplateSchema {
    #[schemars(description = "Template identifier, e.g. 'CA1'")]
    pub template_id: String,

    #[schemars(description = "Template title, e.g. 'Own Funds'")]
    pub template_name: String,

    #[schemars(description = "Units in which monetary fields are reported")]
    pub currency: String,

    #[schemars(description = "Fields in dependency order: a derivation may only reference earlier fields")]
    pub fields: Vec<TemplateField>,
}

impl TemplateSchema {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let schema: TemplateSchema = serde_json::from_str(json)?;
        schema.verify_integrity()?;
        Ok(schema)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// The COREP CA1 own-funds template bundled with the crate.
    pub fn corep_ca1() -> Result<Self> {
        Self::from_json_str(EMBEDDED_CA1_SCHEMA)
    }

    pub fn field(&self, name: &str) -> Option<&TemplateField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Checks names and scenario keys are unique and every derivation only
    /// references numeric fields declared before it, which also rules out cycles.
    pub fn verify_integrity(&self) -> Result<()> {
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut scenario_keys: HashMap<&str, &str> = HashMap::new();

        for (idx, field) in self.fields.iter().enumerate() {
            if field.name.trim().is_empty() {
                return Err(schema_error(
                    &field.name,
                    format!("Field #{} has an empty name", idx),
                ));
            }
            if positions.insert(field.name.as_str(), idx).is_some() {
                return Err(schema_error(&field.name, "Duplicate field name"));
            }
            if let Some(other) = scenario_keys.insert(field.scenario_key(), field.name.as_str()) {
                return Err(schema_error(
                    &field.name,
                    format!(
                        "Scenario key '{}' is already used by field '{}'",
                        field.scenario_key(),
                        other
                    ),
                ));
            }
        }

        for (idx, field) in self.fields.iter().enumerate() {
            match (field.kind, &field.derivation) {
                (FieldKind::Leaf, Some(_)) => {
                    return Err(schema_error(
                        &field.name,
                        "Leaf field must not declare a derivation",
                    ));
                }
                (FieldKind::Derived, None) => {
                    return Err(schema_error(
                        &field.name,
                        "Derived field is missing its derivation",
                    ));
                }
                (FieldKind::Leaf, None) => {}
                (FieldKind::Derived, Some(derivation)) => {
                    self.verify_derivation(idx, field, derivation, &positions)?;
                }
            }
        }

        Ok(())
    }

    fn verify_derivation(
        &self,
        idx: usize,
        field: &TemplateField,
        derivation: &Derivation,
        positions: &HashMap<&str, usize>,
    ) -> Result<()> {
        if field.value_type != ValueType::Number {
            return Err(schema_error(&field.name, "Sum derivation requires a number field"));
        }
        if derivation.operands().is_empty() {
            return Err(schema_error(&field.name, "Sum derivation has no operands"));
        }

        for operand in derivation.operands() {
            let Some(&position) = positions.get(operand.as_str()) else {
                return Err(schema_error(
                    &field.name,
                    format!("Unresolved reference to '{}'", operand),
                ));
            };

            if position >= idx {
                return Err(schema_error(
                    &field.name,
                    format!(
                        "Reference to '{}' is not declared before this field (forward or circular reference)",
                        operand
                    ),
                ));
            }

            if self.fields[position].value_type != ValueType::Number {
                return Err(schema_error(
                    &field.name,
                    format!("Operand '{}' is not a number field", operand),
                ));
            }
        }

        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(TemplateSchema)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

fn schema_error(field: &str, details: impl Into<String>) -> CorepError {
    CorepError::SchemaError {
        field: field.to_string(),
        details: details.into(),
    }
}
