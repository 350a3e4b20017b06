use crate::mapper::FieldOutput;
use crate::scenario::FieldValue;
use crate::validator::ValidationViolation;
use crate::ReportBundle;

const UNKNOWN: &str = "UNKNOWN";

/// Renders the template extract as a Markdown table, one row per field.
pub fn render_markdown(bundle: &ReportBundle) -> String {
    let output = &bundle.output;
    let mut md = String::new();

    md.push_str(&format!(
        "# COREP {} - {}\n\n",
        output.template_id, output.template_name
    ));
    md.push_str(&format!(
        "Entity: {}\n",
        output.entity_id.as_deref().unwrap_or(UNKNOWN)
    ));
    md.push_str(&format!(
        "Reporting date: {}\n",
        output
            .reporting_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| UNKNOWN.to_string())
    ));
    md.push_str(&format!("Currency: {}\n\n", output.currency));

    md.push_str("| Line | Field | Value | Units | Validation flags | Rule refs |\n");
    md.push_str("| --- | --- | --- | --- | --- | --- |\n");

    for field in &output.fields {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            escape_cell(field.line.as_deref().unwrap_or("")),
            escape_cell(&field.label),
            field.value.as_ref().map(format_value).unwrap_or_default(),
            escape_cell(&output.currency),
            flags_for(field, &bundle.violations),
            field.rule_refs.join(", ")
        ));
    }

    if bundle.violations.is_empty() {
        md.push_str("\nValidation: no violations\n");
    } else {
        md.push_str(&format!(
            "\nValidation: {} violation(s)\n\n",
            bundle.violations.len()
        ));
        for violation in &bundle.violations {
            md.push_str(&format!(
                "- **{}** `{}`: {}\n",
                violation.field, violation.kind, violation.detail
            ));
        }
    }

    md
}

fn flags_for(field: &FieldOutput, violations: &[ValidationViolation]) -> String {
    violations
        .iter()
        .filter(|v| v.field == field.name)
        .map(|v| v.kind.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Integer(v) => group_thousands(&v.to_string()),
        FieldValue::Float(v) => {
            let fixed = format!("{:.2}", v);
            match fixed.split_once('.') {
                Some((whole, frac)) => format!("{}.{}", group_thousands(whole), frac),
                None => fixed,
            }
        }
        FieldValue::Text(v) => escape_cell(v),
    }
}

fn group_thousands(digits: &str) -> String {
    let (sign, digits) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", digits),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}{}", sign, grouped)
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
