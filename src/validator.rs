use crate::mapper::{evaluate_derivation, StructuredOutput};
use crate::scenario::FieldValue;
use crate::schema::{FieldKind, TemplateField, TemplateSchema, ValueType};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    MissingRequired,
    SumMismatch,
    TypeMismatch,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::MissingRequired => "missing_required",
            ViolationKind::SumMismatch => "sum_mismatch",
            ViolationKind::TypeMismatch => "type_mismatch",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub field: String,
    pub kind: ViolationKind,
    pub detail: String,
}

pub struct Validator<'a> {
    schema: &'a TemplateSchema,
    tolerance: f64,
}

impl<'a> Validator<'a> {
    pub fn new(schema: &'a TemplateSchema, tolerance: f64) -> Self {
        Self { schema, tolerance }
    }

    /// Checks completeness, value types and sum rules for every field in schema
    /// order. An empty result means the output satisfies the template.
    pub fn validate(&self, output: &StructuredOutput) -> Vec<ValidationViolation> {
        let mut violations = Vec::new();

        for field in &self.schema.fields {
            let Some(value) = output.value(&field.name) else {
                if field.required {
                    violations.push(ValidationViolation {
                        field: field.name.clone(),
                        kind: ViolationKind::MissingRequired,
                        detail: format!("Required field '{}' has no value", field.display_label()),
                    });
                }
                continue;
            };

            if let Some(violation) = check_type(field, value) {
                violations.push(violation);
                continue;
            }

            if field.kind == FieldKind::Derived {
                if let Some(violation) = self.check_sum(field, value, output) {
                    violations.push(violation);
                }
            }
        }

        for violation in &violations {
            warn!(
                "Validation {} on {}: {}",
                violation.kind, violation.field, violation.detail
            );
        }

        violations
    }

    fn check_sum(
        &self,
        field: &TemplateField,
        actual: &FieldValue,
        output: &StructuredOutput,
    ) -> Option<ValidationViolation> {
        let derivation = field.derivation.as_ref()?;
        let expected = evaluate_derivation(derivation, |name| output.value(name))?;

        let matches = match (&expected, actual) {
            (FieldValue::Integer(e), FieldValue::Integer(a)) => e == a,
            _ => {
                let (e, a) = (expected.as_f64()?, actual.as_f64()?);
                (e - a).abs() <= self.tolerance
            }
        };

        (!matches).then(|| ValidationViolation {
            field: field.name.clone(),
            kind: ViolationKind::SumMismatch,
            detail: format!(
                "Sum of {} does not match: expected={}, actual={}",
                derivation.operands().join(" + "),
                expected,
                actual
            ),
        })
    }
}

fn check_type(field: &TemplateField, value: &FieldValue) -> Option<ValidationViolation> {
    let compatible = match field.value_type {
        ValueType::Number => value.is_numeric(),
        ValueType::Text => !value.is_numeric(),
    };

    (!compatible).then(|| ValidationViolation {
        field: field.name.clone(),
        kind: ViolationKind::TypeMismatch,
        detail: format!(
            "Expected a {} value, got '{}'",
            match field.value_type {
                ValueType::Number => "number",
                ValueType::Text => "text",
            },
            value
        ),
    })
}

pub fn validate_output(
    output: &StructuredOutput,
    schema: &TemplateSchema,
    tolerance: f64,
) -> Vec<ValidationViolation> {
    Validator::new(schema, tolerance).validate(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::{FieldOutput, ValueOrigin};
    use crate::schema::Derivation;
    use std::collections::BTreeSet;

    fn field(name: &str, kind: FieldKind, operands: Option<&[&str]>) -> TemplateField {
        TemplateField {
            name: name.to_string(),
            code: None,
            line: None,
            label: None,
            kind,
            value_type: ValueType::Number,
            scenario_key: None,
            derivation: operands.map(|ops| Derivation::Sum {
                operands: ops.iter().map(|o| o.to_string()).collect(),
            }),
            required: true,
            rule_tags: BTreeSet::new(),
        }
    }

    fn schema() -> TemplateSchema {
        TemplateSchema {
            template_id: "CA1".to_string(),
            template_name: "Own Funds".to_string(),
            currency: "GBP".to_string(),
            fields: vec![
                field("CET1", FieldKind::Leaf, None),
                field("AT1", FieldKind::Leaf, None),
                field("Tier2", FieldKind::Leaf, None),
                field("TotalOwnFunds", FieldKind::Derived, Some(&["CET1", "AT1", "Tier2"])),
            ],
        }
    }

    fn output(values: &[(&str, Option<FieldValue>)]) -> StructuredOutput {
        StructuredOutput {
            template_id: "CA1".to_string(),
            template_name: "Own Funds".to_string(),
            currency: "GBP".to_string(),
            entity_id: None,
            reporting_date: None,
            fields: values
                .iter()
                .map(|(name, value)| FieldOutput {
                    name: name.to_string(),
                    code: None,
                    line: None,
                    label: name.to_string(),
                    value: value.clone(),
                    origin: ValueOrigin::Scenario,
                    rule_refs: Vec::new(),
                })
                .collect(),
        }
    }

    fn int(v: i64) -> Option<FieldValue> {
        Some(FieldValue::Integer(v))
    }

    #[test]
    fn test_consistent_output_is_valid() {
        let out = output(&[
            ("CET1", int(100)),
            ("AT1", int(20)),
            ("Tier2", int(10)),
            ("TotalOwnFunds", int(130)),
        ]);
        assert!(validate_output(&out, &schema(), 1e-6).is_empty());
    }

    #[test]
    fn test_sum_mismatch_reports_expected_and_actual() {
        let out = output(&[
            ("CET1", int(100)),
            ("AT1", int(20)),
            ("Tier2", int(10)),
            ("TotalOwnFunds", int(999)),
        ]);

        let violations = validate_output(&out, &schema(), 1e-6);

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "TotalOwnFunds");
        assert_eq!(violations[0].kind, ViolationKind::SumMismatch);
        assert!(violations[0].detail.contains("expected=130"));
        assert!(violations[0].detail.contains("actual=999"));
    }

    #[test]
    fn test_float_sum_within_tolerance() {
        let out = output(&[
            ("CET1", Some(FieldValue::Float(0.1))),
            ("AT1", Some(FieldValue::Float(0.2))),
            ("Tier2", int(0)),
            ("TotalOwnFunds", Some(FieldValue::Float(0.3))),
        ]);
        assert!(validate_output(&out, &schema(), 1e-6).is_empty());

        let off = output(&[
            ("CET1", Some(FieldValue::Float(0.1))),
            ("AT1", Some(FieldValue::Float(0.2))),
            ("Tier2", int(0)),
            ("TotalOwnFunds", Some(FieldValue::Float(0.31))),
        ]);
        let violations = validate_output(&off, &schema(), 1e-6);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::SumMismatch);
    }

    #[test]
    fn test_missing_required_only_once_per_field() {
        let out = output(&[
            ("CET1", int(100)),
            ("AT1", None),
            ("Tier2", int(10)),
            ("TotalOwnFunds", None),
        ]);

        let violations = validate_output(&out, &schema(), 1e-6);

        let kinds: Vec<(&str, ViolationKind)> = violations
            .iter()
            .map(|v| (v.field.as_str(), v.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("AT1", ViolationKind::MissingRequired),
                ("TotalOwnFunds", ViolationKind::MissingRequired),
            ]
        );
    }

    #[test]
    fn test_field_absent_from_output_counts_as_missing() {
        let out = output(&[("CET1", int(1))]);
        let violations = validate_output(&out, &schema(), 1e-6);
        assert_eq!(violations.len(), 3);
        assert!(violations
            .iter()
            .all(|v| v.kind == ViolationKind::MissingRequired));
    }

    #[test]
    fn test_type_mismatch() {
        let out = output(&[
            ("CET1", Some(FieldValue::Text("lots".to_string()))),
            ("AT1", int(20)),
            ("Tier2", int(10)),
            ("TotalOwnFunds", int(30)),
        ]);

        let violations = validate_output(&out, &schema(), 1e-6);

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "CET1");
        assert_eq!(violations[0].kind, ViolationKind::TypeMismatch);
    }

    #[test]
    fn test_number_in_text_field_is_type_mismatch() {
        let mut schema = schema();
        let mut entity = field("EntityName", FieldKind::Leaf, None);
        entity.value_type = ValueType::Text;
        schema.fields.push(entity);

        let out = output(&[
            ("CET1", int(100)),
            ("AT1", int(20)),
            ("Tier2", int(10)),
            ("TotalOwnFunds", int(130)),
            ("EntityName", int(42)),
        ]);

        let violations = validate_output(&out, &schema, 1e-6);

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "EntityName");
        assert_eq!(violations[0].kind, ViolationKind::TypeMismatch);
        assert!(violations[0].detail.contains("Expected a text value"));
    }

    #[test]
    fn test_reported_total_with_null_operand_skips_sum_check() {
        let out = output(&[
            ("CET1", int(100)),
            ("AT1", None),
            ("Tier2", int(10)),
            ("TotalOwnFunds", int(999)),
        ]);

        let violations = validate_output(&out, &schema(), 1e-6);

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "AT1");
        assert_eq!(violations[0].kind, ViolationKind::MissingRequired);
        assert!(violations
            .iter()
            .all(|v| v.kind != ViolationKind::SumMismatch));
    }

    #[test]
    fn test_violation_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ViolationKind::SumMismatch).unwrap();
        assert_eq!(json, "\"sum_mismatch\"");
    }
}
