use crate::error::Result;
use crate::mapper::StructuredOutput;
use crate::render::render_markdown;
use crate::validator::ValidationViolation;
use crate::ReportBundle;
use log::info;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const STRUCTURED_OUTPUT_FILE: &str = "structured_output.json";
pub const AUDIT_LOG_FILE: &str = "audit_log.json";
pub const TEMPLATE_EXTRACT_FILE: &str = "template_extract.md";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub structured_output: PathBuf,
    pub audit_log: PathBuf,
    pub template_extract: PathBuf,
}

/// Structured output with its violations embedded, as written to disk.
#[derive(Serialize)]
struct StructuredOutputArtifact<'a> {
    #[serde(flatten)]
    output: &'a StructuredOutput,
    violations: &'a [ValidationViolation],
}

/// Writes the three report artifacts into `dir`, creating it if needed.
pub fn write_artifacts(bundle: &ReportBundle, dir: impl AsRef<Path>) -> Result<ArtifactPaths> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let paths = ArtifactPaths {
        structured_output: dir.join(STRUCTURED_OUTPUT_FILE),
        audit_log: dir.join(AUDIT_LOG_FILE),
        template_extract: dir.join(TEMPLATE_EXTRACT_FILE),
    };

    let structured = StructuredOutputArtifact {
        output: &bundle.output,
        violations: &bundle.violations,
    };
    fs::write(
        &paths.structured_output,
        serde_json::to_string_pretty(&structured)?,
    )?;
    fs::write(&paths.audit_log, bundle.audit_log.to_json()?)?;
    fs::write(&paths.template_extract, render_markdown(bundle))?;

    info!("Wrote report artifacts to {}", dir.display());

    Ok(paths)
}
