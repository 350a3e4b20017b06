//! # COREP Assistant
//!
//! A deterministic, offline assistant that turns an analyst's question and a
//! reporting scenario into a populated COREP CA1 (own funds) template, with
//! every value linked to the regulatory excerpts that justify it.
//!
//! ## Core Concepts
//!
//! - **Regulation Corpus**: curated regulatory excerpts tagged with keywords
//! - **Template Schema**: ordered CA1 fields, leaf or derived, with their rule tags
//! - **Retrieval**: keyword overlap scoring; tag matches count double and rule-tag
//!   hints always outrank coincidental text matches
//! - **Mapping**: scenario values placed onto the template, derived totals computed
//! - **Validation**: completeness, type and sum checks collected as violations
//! - **Audit Log**: every rule reference resolved back to its excerpt text
//!
//! ## Example
//!
//! ```rust,ignore
//! use corep_assistant::*;
//!
//! let assistant = ReportingAssistant::new(
//!     RegulationCorpus::embedded()?,
//!     TemplateSchema::corep_ca1()?,
//!     AssistantConfig::default(),
//! )?;
//!
//! let scenario = Scenario::new()
//!     .with("cet1_gbp_thousands", 450_000_i64)
//!     .with("at1_gbp_thousands", 50_000_i64)
//!     .with("t2_gbp_thousands", 100_000_i64);
//!
//! let bundle = assistant.run("How do we report total own funds?", &scenario)?;
//! assert!(bundle.violations.is_empty());
//! ```

pub mod artifacts;
pub mod audit;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod error;
pub mod mapper;
pub mod render;
pub mod retriever;
pub mod scenario;
pub mod schema;
pub mod validator;

pub use artifacts::{write_artifacts, ArtifactPaths};
pub use audit::{build_audit_log, AuditLog, AuditLogEntry, AuditLogger, QUESTION_SCOPE};
pub use config::{AssistantConfig, RetrievalConfig};
pub use corpus::{RegulationCorpus, RegulationExcerpt};
pub use error::{CorepError, Result};
pub use mapper::{map_scenario, FieldOutput, SchemaMapper, StructuredOutput, ValueOrigin};
pub use render::render_markdown;
pub use retriever::{tokenize, RetrievedExcerpt, Retriever, ScoredReference};
pub use scenario::{FieldValue, ReportingContext, Scenario};
pub use schema::{Derivation, FieldKind, TemplateField, TemplateSchema, ValueType};
pub use validator::{validate_output, ValidationViolation, Validator, ViolationKind};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Everything one invocation produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportBundle {
    pub output: StructuredOutput,
    pub violations: Vec<ValidationViolation>,
    pub audit_log: AuditLog,
}

impl ReportBundle {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Holds the read-only corpus and schema and runs the full pipeline.
pub struct ReportingAssistant {
    corpus: RegulationCorpus,
    schema: TemplateSchema,
    config: AssistantConfig,
    retriever: Retriever,
}

impl ReportingAssistant {
    pub fn new(
        corpus: RegulationCorpus,
        schema: TemplateSchema,
        config: AssistantConfig,
    ) -> Result<Self> {
        config.validate()?;
        schema.verify_integrity()?;

        debug!(
            "Assistant ready: {} excerpts, template {} with {} fields",
            corpus.len(),
            schema.template_id,
            schema.fields.len()
        );

        let retriever = Retriever::new(config.retrieval.clone());
        Ok(Self {
            corpus,
            schema,
            config,
            retriever,
        })
    }

    pub fn corpus(&self) -> &RegulationCorpus {
        &self.corpus
    }

    pub fn schema(&self) -> &TemplateSchema {
        &self.schema
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    /// Question retrieval, mapping, validation and audit assembly. Schema and
    /// reference errors abort; violations are returned inside the bundle.
    pub fn run(&self, question: &str, scenario: &Scenario) -> Result<ReportBundle> {
        info!("Answering question: {}", question);

        let question_level = self.retriever.retrieve(
            question,
            &self.corpus,
            &BTreeSet::new(),
            self.config.retrieval.question_limit,
        );
        debug!(
            "Question matched excerpts {:?}",
            question_level
                .iter()
                .map(|hit| hit.excerpt.id.as_str())
                .collect::<Vec<_>>()
        );

        let output = SchemaMapper::new(&self.schema, &self.retriever, &self.corpus).map(scenario)?;
        let violations = Validator::new(&self.schema, self.config.sum_tolerance).validate(&output);
        let audit_log = AuditLogger::new(&self.corpus).build(question, &output, &question_level)?;

        info!(
            "Report for template {} complete with {} violation(s)",
            output.template_id,
            violations.len()
        );

        Ok(ReportBundle {
            output,
            violations,
            audit_log,
        })
    }
}

pub fn run_pipeline(
    question: &str,
    scenario: &Scenario,
    corpus: &RegulationCorpus,
    schema: &TemplateSchema,
    config: &AssistantConfig,
) -> Result<ReportBundle> {
    ReportingAssistant::new(corpus.clone(), schema.clone(), config.clone())?.run(question, scenario)
}
