use crate::error::{CorepError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Scoring weights and result limits for keyword retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RetrievalConfig {
    #[schemars(description = "Points per query token that matches an excerpt tag")]
    pub tag_weight: f64,

    #[schemars(description = "Points per query token that matches a word of the excerpt text")]
    pub text_weight: f64,

    #[schemars(
        description = "Bonus for excerpts whose tags intersect the field's rule tags. Raised automatically when lower than the best achievable token score."
    )]
    pub hint_bonus: f64,

    #[schemars(description = "Maximum rule references attached to one field")]
    pub field_limit: usize,

    #[schemars(description = "Maximum excerpts retrieved for the question itself")]
    pub question_limit: usize,

    #[schemars(description = "Tokens shorter than this many characters are discarded")]
    pub min_token_len: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            tag_weight: 2.0,
            text_weight: 1.0,
            hint_bonus: 100.0,
            field_limit: 3,
            question_limit: 5,
            min_token_len: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AssistantConfig {
    pub retrieval: RetrievalConfig,

    #[schemars(description = "Absolute tolerance when comparing non-integer sums")]
    pub sum_tolerance: f64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            retrieval: RetrievalConfig::default(),
            sum_tolerance: 1e-6,
        }
    }
}

impl AssistantConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: AssistantConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;

        if !is_positive(r.tag_weight) || !is_positive(r.text_weight) {
            return Err(CorepError::InvalidConfig(format!(
                "retrieval weights must be positive (tag_weight={}, text_weight={})",
                r.tag_weight, r.text_weight
            )));
        }
        if !is_non_negative(r.hint_bonus) {
            return Err(CorepError::InvalidConfig(format!(
                "hint_bonus must be a finite non-negative number, got {}",
                r.hint_bonus
            )));
        }
        if r.field_limit == 0 || r.question_limit == 0 {
            return Err(CorepError::InvalidConfig(
                "retrieval limits must be at least 1".to_string(),
            ));
        }
        if r.min_token_len == 0 {
            return Err(CorepError::InvalidConfig(
                "min_token_len must be at least 1".to_string(),
            ));
        }
        if !is_non_negative(self.sum_tolerance) {
            return Err(CorepError::InvalidConfig(format!(
                "sum_tolerance must be a finite non-negative number, got {}",
                self.sum_tolerance
            )));
        }

        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AssistantConfig)
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn is_non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}
