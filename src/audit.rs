use crate::corpus::RegulationCorpus;
use crate::error::{CorepError, Result};
use crate::mapper::StructuredOutput;
use crate::retriever::{RetrievedExcerpt, ScoredReference};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field name reserved for the entry that justifies the question as a whole.
pub const QUESTION_SCOPE: &str = "";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub field: String,
    pub rule_refs: Vec<String>,
    pub excerpt_text: BTreeMap<String, String>,
    /// Headings of the referenced excerpts that carry one
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub excerpt_title: BTreeMap<String, String>,
}

impl AuditLogEntry {
    pub fn is_question_scope(&self) -> bool {
        self.field == QUESTION_SCOPE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub question: String,
    /// Field entries in template order, followed by the question entry
    pub entries: Vec<AuditLogEntry>,
    /// Scores of the question-level matches, best first
    pub question_matches: Vec<ScoredReference>,
}

impl AuditLog {
    pub fn question_entry(&self) -> Option<&AuditLogEntry> {
        self.entries.iter().find(|e| e.is_question_scope())
    }

    pub fn entry(&self, field: &str) -> Option<&AuditLogEntry> {
        self.entries.iter().find(|e| e.field == field)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

pub struct AuditLogger<'a> {
    corpus: &'a RegulationCorpus,
}

impl<'a> AuditLogger<'a> {
    pub fn new(corpus: &'a RegulationCorpus) -> Self {
        Self { corpus }
    }

    /// Resolves every rule reference to its excerpt text. A reference that is
    /// not in the corpus is an internal inconsistency and fails the build.
    pub fn build(
        &self,
        question: &str,
        output: &StructuredOutput,
        question_level: &[RetrievedExcerpt<'_>],
    ) -> Result<AuditLog> {
        let mut entries = Vec::new();

        for field in &output.fields {
            if field.rule_refs.is_empty() {
                continue;
            }
            entries.push(self.entry(&field.name, &field.rule_refs)?);
        }

        let question_refs: Vec<String> = question_level
            .iter()
            .map(|hit| hit.excerpt.id.clone())
            .collect();
        entries.push(self.entry(QUESTION_SCOPE, &question_refs)?);

        debug!(
            "Audit log assembled with {} field entries and {} question matches",
            entries.len() - 1,
            question_refs.len()
        );

        Ok(AuditLog {
            question: question.to_string(),
            entries,
            question_matches: question_level
                .iter()
                .map(RetrievedExcerpt::to_scored_reference)
                .collect(),
        })
    }

    fn entry(&self, field: &str, rule_refs: &[String]) -> Result<AuditLogEntry> {
        let mut excerpt_text = BTreeMap::new();
        let mut excerpt_title = BTreeMap::new();

        for id in rule_refs {
            let excerpt = self
                .corpus
                .get(id)
                .ok_or_else(|| CorepError::UnresolvedReference {
                    field: field.to_string(),
                    id: id.clone(),
                })?;
            excerpt_text.insert(id.clone(), excerpt.text.clone());
            if let Some(title) = &excerpt.title {
                excerpt_title.insert(id.clone(), title.clone());
            }
        }

        Ok(AuditLogEntry {
            field: field.to_string(),
            rule_refs: rule_refs.to_vec(),
            excerpt_text,
            excerpt_title,
        })
    }
}

pub fn build_audit_log(
    question: &str,
    output: &StructuredOutput,
    question_level: &[RetrievedExcerpt<'_>],
    corpus: &RegulationCorpus,
) -> Result<AuditLog> {
    AuditLogger::new(corpus).build(question, output, question_level)
}
