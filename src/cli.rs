//! Command-line interface for the reporting assistant.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};

use crate::artifacts::write_artifacts;
use crate::config::AssistantConfig;
use crate::corpus::RegulationCorpus;
use crate::error::Result;
use crate::scenario::Scenario;
use crate::schema::TemplateSchema;
use crate::ReportingAssistant;

/// COREP Assistant - populate the CA1 own-funds template with rule references.
#[derive(Parser)]
#[command(name = "corep-assistant")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Map a scenario onto the template and write the report artifacts.
    Report {
        /// Natural-language question from the analyst
        #[arg(short, long)]
        question: String,

        /// Path to the JSON scenario
        #[arg(short, long)]
        scenario: PathBuf,

        /// Output directory for generated artifacts
        #[arg(short, long)]
        output: PathBuf,

        /// Regulation excerpts JSON (default: bundled PRA/EBA excerpts)
        #[arg(long)]
        regulations: Option<PathBuf>,

        /// Template schema JSON (default: bundled CA1 schema)
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Assistant configuration JSON (default: built-in constants)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the JSON Schema of an input file format.
    JsonSchema {
        #[arg(value_enum)]
        kind: SchemaKind,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SchemaKind {
    Corpus,
    Schema,
    Config,
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Report {
            question,
            scenario,
            output,
            regulations,
            schema,
            config,
        } => report_command(
            &question,
            &scenario,
            &output,
            regulations.as_deref(),
            schema.as_deref(),
            config.as_deref(),
        ),
        Commands::JsonSchema { kind } => json_schema_command(kind),
    }
}

fn report_command(
    question: &str,
    scenario_path: &Path,
    output_dir: &Path,
    regulations: Option<&Path>,
    schema: Option<&Path>,
    config: Option<&Path>,
) -> Result<()> {
    let corpus = match regulations {
        Some(path) => RegulationCorpus::from_json_file(path)?,
        None => RegulationCorpus::embedded()?,
    };
    let schema = match schema {
        Some(path) => TemplateSchema::from_json_file(path)?,
        None => TemplateSchema::corep_ca1()?,
    };
    let config = match config {
        Some(path) => AssistantConfig::from_json_file(path)?,
        None => AssistantConfig::default(),
    };
    let scenario = Scenario::from_json_file(scenario_path)?;

    let assistant = ReportingAssistant::new(corpus, schema, config)?;
    let bundle = assistant.run(question, &scenario)?;
    let paths = write_artifacts(&bundle, output_dir)?;

    println!(
        "Wrote structured output to {}",
        paths.structured_output.display()
    );
    println!(
        "Wrote template extract to {}",
        paths.template_extract.display()
    );
    println!("Wrote audit log to {}", paths.audit_log.display());

    if bundle.violations.is_empty() {
        println!("Validation passed");
    } else {
        println!("Validation found {} violation(s):", bundle.violations.len());
        for violation in &bundle.violations {
            println!(
                "  {} [{}]: {}",
                violation.field, violation.kind, violation.detail
            );
        }
    }

    Ok(())
}

fn json_schema_command(kind: SchemaKind) -> Result<()> {
    let schema = match kind {
        SchemaKind::Corpus => RegulationCorpus::generate_json_schema(),
        SchemaKind::Schema => TemplateSchema::generate_json_schema(),
        SchemaKind::Config => AssistantConfig::generate_json_schema(),
    };
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
