use crate::corpus::RegulationCorpus;
use crate::error::Result;
use crate::retriever::Retriever;
use crate::scenario::{FieldValue, Scenario};
use crate::schema::{Derivation, FieldKind, TemplateField, TemplateSchema, ValueType};
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueOrigin {
    /// Taken from the scenario (possibly after type coercion)
    Scenario,
    /// Computed from the field's derivation formula
    Derived,
    /// Not supplied and not computable
    Absent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOutput {
    pub name: String,
    pub code: Option<String>,
    pub line: Option<String>,
    pub label: String,
    pub value: Option<FieldValue>,
    pub origin: ValueOrigin,
    /// Excerpt ids justifying the value, best match first
    pub rule_refs: Vec<String>,
}

/// Template values in schema order, with header metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredOutput {
    pub template_id: String,
    pub template_name: String,
    pub currency: String,
    pub entity_id: Option<String>,
    pub reporting_date: Option<NaiveDate>,
    pub fields: Vec<FieldOutput>,
}

impl StructuredOutput {
    pub fn get(&self, name: &str) -> Option<&FieldOutput> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.get(name).and_then(|f| f.value.as_ref())
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

pub struct SchemaMapper<'a> {
    schema: &'a TemplateSchema,
    retriever: &'a Retriever,
    corpus: &'a RegulationCorpus,
}

impl<'a> SchemaMapper<'a> {
    pub fn new(
        schema: &'a TemplateSchema,
        retriever: &'a Retriever,
        corpus: &'a RegulationCorpus,
    ) -> Self {
        Self {
            schema,
            retriever,
            corpus,
        }
    }

    /// Maps the scenario onto the template. Fails before producing any output
    /// when the schema itself is malformed.
    pub fn map(&self, scenario: &Scenario) -> Result<StructuredOutput> {
        self.schema.verify_integrity()?;
        let context = scenario.reporting_context();

        info!(
            "Mapping scenario with {} keys onto template {} ({} fields)",
            scenario.len(),
            self.schema.template_id,
            self.schema.fields.len()
        );

        let mut fields: Vec<FieldOutput> = Vec::with_capacity(self.schema.fields.len());

        for field in &self.schema.fields {
            let (value, origin) = match field.kind {
                FieldKind::Leaf => self.read_scenario_value(field, scenario),
                FieldKind::Derived => self.derive_value(field, scenario, &fields),
            };

            let rule_refs = match &value {
                Some(v) => self.attach_rule_refs(field, v),
                None => Vec::new(),
            };

            debug!(
                "Field {} -> {:?} ({:?}), rule refs {:?}",
                field.name, value, origin, rule_refs
            );

            fields.push(FieldOutput {
                name: field.name.clone(),
                code: field.code.clone(),
                line: field.line.clone(),
                label: field.display_label().to_string(),
                value,
                origin,
                rule_refs,
            });
        }

        Ok(StructuredOutput {
            template_id: self.schema.template_id.clone(),
            template_name: self.schema.template_name.clone(),
            currency: self.schema.currency.clone(),
            entity_id: context.entity_id,
            reporting_date: context.reporting_date,
            fields,
        })
    }

    fn read_scenario_value(
        &self,
        field: &TemplateField,
        scenario: &Scenario,
    ) -> (Option<FieldValue>, ValueOrigin) {
        match scenario.get(field.scenario_key()) {
            Some(raw) => (Some(coerce(field, raw)), ValueOrigin::Scenario),
            None => (None, ValueOrigin::Absent),
        }
    }

    fn derive_value(
        &self,
        field: &TemplateField,
        scenario: &Scenario,
        populated: &[FieldOutput],
    ) -> (Option<FieldValue>, ValueOrigin) {
        // Reported figures take precedence over the formula.
        if let Some(raw) = scenario.get(field.scenario_key()) {
            return (Some(coerce(field, raw)), ValueOrigin::Scenario);
        }

        let Some(derivation) = &field.derivation else {
            return (None, ValueOrigin::Absent);
        };

        let computed = evaluate_derivation(derivation, |name| {
            populated
                .iter()
                .find(|f| f.name == name)
                .and_then(|f| f.value.as_ref())
        });

        match computed {
            Some(value) => (Some(value), ValueOrigin::Derived),
            None => (None, ValueOrigin::Absent),
        }
    }

    fn attach_rule_refs(&self, field: &TemplateField, value: &FieldValue) -> Vec<String> {
        let query = format!("{} {}", field.name, value);
        self.retriever
            .retrieve(
                &query,
                self.corpus,
                &field.rule_tags,
                self.retriever.config().field_limit,
            )
            .into_iter()
            .map(|hit| hit.excerpt.id.clone())
            .collect()
    }
}

pub fn map_scenario(
    scenario: &Scenario,
    schema: &TemplateSchema,
    retriever: &Retriever,
    corpus: &RegulationCorpus,
) -> Result<StructuredOutput> {
    SchemaMapper::new(schema, retriever, corpus).map(scenario)
}

/// Evaluates a derivation over already known values. Returns `None` when an
/// operand is missing or not numeric.
pub fn evaluate_derivation<'v>(
    derivation: &Derivation,
    lookup: impl Fn(&str) -> Option<&'v FieldValue>,
) -> Option<FieldValue> {
    match derivation {
        Derivation::Sum { operands } => {
            let mut values = Vec::with_capacity(operands.len());
            for operand in operands {
                let value = lookup(operand.as_str())?;
                if !value.is_numeric() {
                    return None;
                }
                values.push(value);
            }
            Some(sum_values(&values))
        }
    }
}

/// Integer sums stay integers unless they overflow; any float makes a float.
fn sum_values(values: &[&FieldValue]) -> FieldValue {
    let mut integer_total: Option<i64> = Some(0);
    let mut float_total = 0.0;

    for value in values {
        match value {
            FieldValue::Integer(v) => {
                integer_total = integer_total.and_then(|t| t.checked_add(*v));
            }
            _ => integer_total = None,
        }
        float_total += value.as_f64().unwrap_or(0.0);
    }

    match integer_total {
        Some(total) => FieldValue::Integer(total),
        None => FieldValue::Float(float_total),
    }
}

fn coerce(field: &TemplateField, raw: &FieldValue) -> FieldValue {
    match (field.value_type, raw) {
        (ValueType::Number, FieldValue::Text(text)) => match FieldValue::parse_numeric(text) {
            Some(number) => number,
            None => {
                warn!(
                    "Field {} expects a number but scenario value '{}' is not numeric",
                    field.name, text
                );
                raw.clone()
            }
        },
        (ValueType::Text, FieldValue::Integer(_) | FieldValue::Float(_)) => {
            FieldValue::Text(raw.to_string())
        }
        _ => raw.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::RegulationExcerpt;
    use crate::error::CorepError;
    use std::collections::BTreeSet;

    fn field(name: &str, kind: FieldKind, derivation: Option<&[&str]>) -> TemplateField {
        TemplateField {
            name: name.to_string(),
            code: None,
            line: None,
            label: None,
            kind,
            value_type: ValueType::Number,
            scenario_key: None,
            derivation: derivation.map(|ops| Derivation::Sum {
                operands: ops.iter().map(|o| o.to_string()).collect(),
            }),
            required: true,
            rule_tags: [name.to_lowercase()].into_iter().collect(),
        }
    }

    fn own_funds_schema() -> TemplateSchema {
        TemplateSchema {
            template_id: "CA1".to_string(),
            template_name: "Own Funds".to_string(),
            currency: "GBP".to_string(),
            fields: vec![
                field("CET1", FieldKind::Leaf, None),
                field("AT1", FieldKind::Leaf, None),
                field("Tier2", FieldKind::Leaf, None),
                field(
                    "TotalOwnFunds",
                    FieldKind::Derived,
                    Some(&["CET1", "AT1", "Tier2"]),
                ),
            ],
        }
    }

    fn corpus() -> RegulationCorpus {
        let excerpt = |id: &str, text: &str, tags: &[&str]| RegulationExcerpt {
            id: id.to_string(),
            title: None,
            text: text.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
        };
        RegulationCorpus::new(vec![
            excerpt("R1", "Common equity tier 1 capital", &["cet1"]),
            excerpt("R2", "Additional tier 1 instruments", &["at1"]),
            excerpt("R3", "Tier 2 capital instruments", &["tier2"]),
            excerpt("R4", "Total own funds", &["totalownfunds"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_leaf_values_and_computed_total() {
        let schema = own_funds_schema();
        let corpus = corpus();
        let retriever = Retriever::default();
        let scenario = Scenario::new()
            .with("CET1", 100_i64)
            .with("AT1", 20_i64)
            .with("Tier2", 10_i64);

        let output = map_scenario(&scenario, &schema, &retriever, &corpus).unwrap();

        assert_eq!(output.value("CET1"), Some(&FieldValue::Integer(100)));
        let total = output.get("TotalOwnFunds").unwrap();
        assert_eq!(total.value, Some(FieldValue::Integer(130)));
        assert_eq!(total.origin, ValueOrigin::Derived);
        assert_eq!(output.get("CET1").unwrap().rule_refs.first().map(String::as_str), Some("R1"));
        assert_eq!(total.rule_refs.first().map(String::as_str), Some("R4"));
    }

    #[test]
    fn test_reported_total_is_kept() {
        let schema = own_funds_schema();
        let corpus = corpus();
        let retriever = Retriever::default();
        let scenario = Scenario::new()
            .with("CET1", 100_i64)
            .with("AT1", 20_i64)
            .with("Tier2", 10_i64)
            .with("TotalOwnFunds", 999_i64);

        let output = map_scenario(&scenario, &schema, &retriever, &corpus).unwrap();
        let total = output.get("TotalOwnFunds").unwrap();

        assert_eq!(total.value, Some(FieldValue::Integer(999)));
        assert_eq!(total.origin, ValueOrigin::Scenario);
    }

    #[test]
    fn test_malformed_reporting_date_still_maps() {
        let scenario = Scenario::from_json_str(
            r#"{"CET1": 100, "AT1": 20, "Tier2": 10, "reporting_date": "31/12/2024"}"#,
        )
        .unwrap();

        let output =
            map_scenario(&scenario, &own_funds_schema(), &Retriever::default(), &corpus()).unwrap();

        assert_eq!(output.reporting_date, None);
        assert_eq!(output.value("TotalOwnFunds"), Some(&FieldValue::Integer(130)));
    }

    #[test]
    fn test_missing_operand_leaves_total_null() {
        let schema = own_funds_schema();
        let corpus = corpus();
        let retriever = Retriever::default();
        let scenario = Scenario::new().with("CET1", 100_i64).with("AT1", 20_i64);

        let output = map_scenario(&scenario, &schema, &retriever, &corpus).unwrap();

        let tier2 = output.get("Tier2").unwrap();
        assert_eq!(tier2.value, None);
        assert_eq!(tier2.origin, ValueOrigin::Absent);
        assert!(tier2.rule_refs.is_empty());
        assert_eq!(output.value("TotalOwnFunds"), None);
    }

    #[test]
    fn test_numeric_text_is_coerced_and_float_sum() {
        let schema = own_funds_schema();
        let corpus = corpus();
        let retriever = Retriever::default();
        let scenario = Scenario::new()
            .with("CET1", "100.5")
            .with("AT1", 20_i64)
            .with("Tier2", "not a number");

        let output = map_scenario(&scenario, &schema, &retriever, &corpus).unwrap();

        assert_eq!(output.value("CET1"), Some(&FieldValue::Float(100.5)));
        assert_eq!(
            output.value("Tier2"),
            Some(&FieldValue::Text("not a number".to_string()))
        );
        assert_eq!(output.value("TotalOwnFunds"), None);
    }

    #[test]
    fn test_text_field_stringifies_numbers() {
        let mut schema = own_funds_schema();
        let mut name = field("EntityName", FieldKind::Leaf, None);
        name.value_type = ValueType::Text;
        schema.fields.push(name);

        let output = map_scenario(
            &Scenario::new().with("EntityName", 42_i64),
            &schema,
            &Retriever::default(),
            &corpus(),
        )
        .unwrap();

        assert_eq!(output.value("EntityName"), Some(&FieldValue::Text("42".to_string())));
    }

    #[test]
    fn test_malformed_schema_aborts_mapping() {
        let mut schema = own_funds_schema();
        schema.fields.rotate_right(1);

        let result = map_scenario(&Scenario::new(), &schema, &Retriever::default(), &corpus());

        assert!(matches!(result, Err(CorepError::SchemaError { .. })));
    }

    #[test]
    fn test_sum_overflow_falls_back_to_float() {
        let a = FieldValue::Integer(i64::MAX);
        let b = FieldValue::Integer(1);
        assert!(matches!(sum_values(&[&a, &b]), FieldValue::Float(_)));
    }
}
