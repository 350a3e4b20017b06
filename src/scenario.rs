use crate::error::{CorepError, Result};
use chrono::NaiveDate;
use log::warn;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

pub const ENTITY_ID_KEY: &str = "entity_id";
pub const REPORTING_DATE_KEY: &str = "reporting_date";

/// A typed scenario or template value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, FieldValue::Text(_))
    }

    /// Parses numeric text ("1,250", " 42.5 ") into a number.
    pub fn parse_numeric(text: &str) -> Option<FieldValue> {
        let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
        if cleaned.is_empty() {
            return None;
        }
        if let Ok(v) = cleaned.parse::<i64>() {
            return Some(FieldValue::Integer(v));
        }
        cleaned
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(FieldValue::Float)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

/// Flat key/value reporting scenario supplied by the analyst.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Scenario {
    values: BTreeMap<String, FieldValue>,
}

impl Scenario {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parses a flat JSON object. `null` entries are treated as absent; booleans,
    /// arrays and nested objects are rejected.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)?;
        let mut scenario = Scenario::new();

        for (key, value) in raw {
            let typed = match value {
                serde_json::Value::Null => continue,
                serde_json::Value::Number(n) => {
                    if let Some(i) = n.as_i64() {
                        FieldValue::Integer(i)
                    } else if let Some(f) = n.as_f64() {
                        FieldValue::Float(f)
                    } else {
                        return Err(invalid(&key, format!("unsupported number {}", n)));
                    }
                }
                serde_json::Value::String(s) => FieldValue::Text(s),
                serde_json::Value::Bool(_) => {
                    return Err(invalid(&key, "boolean values are not supported"));
                }
                serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                    return Err(invalid(&key, "nested values are not supported"));
                }
            };
            scenario.values.insert(key, typed);
        }

        Ok(scenario)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Extracts the report header from the reserved scenario keys. A date that
    /// is not a `YYYY-MM-DD` string is logged and reported as unknown.
    pub fn reporting_context(&self) -> ReportingContext {
        let entity_id = self.get(ENTITY_ID_KEY).map(|v| v.to_string());

        let reporting_date = match self.get(REPORTING_DATE_KEY) {
            None => None,
            Some(FieldValue::Text(raw)) => match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
                Ok(date) => Some(date),
                Err(_) => {
                    warn!(
                        "Ignoring {}: invalid date '{}', expected YYYY-MM-DD",
                        REPORTING_DATE_KEY, raw
                    );
                    None
                }
            },
            Some(other) => {
                warn!(
                    "Ignoring {}: expected a YYYY-MM-DD string, got {}",
                    REPORTING_DATE_KEY, other
                );
                None
            }
        };

        ReportingContext {
            entity_id,
            reporting_date,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingContext {
    pub entity_id: Option<String>,
    pub reporting_date: Option<NaiveDate>,
}

fn invalid(key: &str, details: impl Into<String>) -> CorepError {
    CorepError::InvalidScenario {
        key: key.to_string(),
        details: details.into(),
    }
}
