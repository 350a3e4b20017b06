use crate::error::{CorepError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

const EMBEDDED_REGULATIONS: &str = include_str!("../data/regulations.json");

/// A curated snippet of regulatory text used as justification for reported values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RegulationExcerpt {
    #[schemars(description = "Unique identifier of the excerpt (e.g., 'PRA_OF_010')")]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional short heading, recorded next to the text in the audit log")]
    pub title: Option<String>,

    #[schemars(description = "The regulatory text of the excerpt")]
    pub text: String,

    #[serde(default)]
    #[schemars(description = "Topical keywords, matched case-insensitively against query tokens")]
    pub tags: BTreeSet<String>,
}

/// Ordered, read-only collection of excerpts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RegulationCorpus {
    excerpts: Vec<RegulationExcerpt>,
}

impl RegulationCorpus {
    /// Builds a corpus, lowercasing tags and rejecting empty or duplicate ids.
    pub fn new(excerpts: Vec<RegulationExcerpt>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut normalized = Vec::with_capacity(excerpts.len());

        for mut excerpt in excerpts {
            if excerpt.id.trim().is_empty() {
                return Err(CorepError::InvalidCorpus(
                    "excerpt with empty id".to_string(),
                ));
            }
            if !seen.insert(excerpt.id.clone()) {
                return Err(CorepError::InvalidCorpus(format!(
                    "duplicate excerpt id '{}'",
                    excerpt.id
                )));
            }
            excerpt.tags = excerpt
                .tags
                .iter()
                .map(|tag| tag.trim().to_lowercase())
                .filter(|tag| !tag.is_empty())
                .collect();
            normalized.push(excerpt);
        }

        Ok(Self {
            excerpts: normalized,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let excerpts: Vec<RegulationExcerpt> = serde_json::from_str(json)?;
        Self::new(excerpts)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// The curated PRA/EBA own-funds excerpts bundled with the crate.
    pub fn embedded() -> Result<Self> {
        Self::from_json_str(EMBEDDED_REGULATIONS)
    }

    pub fn get(&self, id: &str) -> Option<&RegulationExcerpt> {
        self.excerpts.iter().find(|e| e.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegulationExcerpt> {
        self.excerpts.iter()
    }

    pub fn len(&self) -> usize {
        self.excerpts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.excerpts.is_empty()
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(RegulationCorpus)
    }
}
