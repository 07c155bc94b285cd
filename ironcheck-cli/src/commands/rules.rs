//! `ironcheck rules` command handler

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use ironcheck_core::config::IroncheckConfig;
use ironcheck_resolver::ResolverConfig;
use ironcheck_resolver::hints::HintFile;
use ironcheck_resolver::suppression::{RuleDocument, RuleLimits, RuleLoader, SuppressionFile};

use crate::cli::{RuleKind, RulesAction, RulesArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `rules` command.
pub async fn execute(
    args: RulesArgs,
    config: &IroncheckConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        RulesAction::Validate { path, kind } => {
            let limits = RuleLimits::from_config(&ResolverConfig::from_core(config));
            execute_validate(&path, kind, limits, writer).await
        }
    }
}

async fn execute_validate(
    path: &Path,
    kind: RuleKind,
    limits: RuleLimits,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %path.display(), kind = ?kind, "validating rule files");

    let report = validate_path(path, kind, limits).await?;
    writer.render(&report)?;

    if report.invalid > 0 {
        return Err(CliError::Rule(format!(
            "{} of {} rule files are invalid",
            report.invalid, report.total_files
        )));
    }
    Ok(())
}

/// Validate every rule file under `path` and collect per-file results.
///
/// Unlike the loader used during analysis, a broken file is reported
/// rather than skipped.
pub async fn validate_path(
    path: &Path,
    kind: RuleKind,
    limits: RuleLimits,
) -> Result<RuleValidationReport, CliError> {
    let files = rule_files(path).await?;

    let mut report = RuleValidationReport {
        path: path.display().to_string(),
        kind: match kind {
            RuleKind::Suppression => "suppression",
            RuleKind::Hint => "hint",
        }
        .to_owned(),
        total_files: files.len(),
        valid: 0,
        invalid: 0,
        rules: 0,
        errors: Vec::new(),
    };

    for file in files {
        let result = match kind {
            RuleKind::Suppression => count_rules::<SuppressionFile>(&file, limits).await,
            RuleKind::Hint => count_rules::<HintFile>(&file, limits).await,
        };
        match result {
            Ok(count) => {
                report.valid += 1;
                report.rules += count;
            }
            Err(e) => {
                report.invalid += 1;
                report.errors.push(RuleFileError {
                    file: file.display().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }
    Ok(report)
}

async fn count_rules<D: RuleDocument>(
    file: &Path,
    limits: RuleLimits,
) -> Result<usize, ironcheck_resolver::ResolverError> {
    Ok(RuleLoader::load_file::<D>(file, limits).await?.len())
}

/// A single file, or the sorted YAML files of a directory.
async fn rule_files(path: &Path) -> Result<Vec<PathBuf>, CliError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| CliError::Rule(format!("{}: {e}", path.display())))?;
    if !metadata.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut entries = tokio::fs::read_dir(path).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let file = entry.path();
        if file
            .extension()
            .is_some_and(|ext| ext == "yml" || ext == "yaml")
        {
            files.push(file);
        }
    }
    files.sort();
    Ok(files)
}

#[derive(Serialize)]
pub struct RuleValidationReport {
    pub path: String,
    pub kind: String,
    pub total_files: usize,
    pub valid: usize,
    pub invalid: usize,
    pub rules: usize,
    pub errors: Vec<RuleFileError>,
}

#[derive(Serialize)]
pub struct RuleFileError {
    pub file: String,
    pub error: String,
}

impl Render for RuleValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Rule Validation ({}): {}", self.kind, self.path.bold())?;
        writeln!(w, "  Files:   {}", self.total_files)?;
        writeln!(w, "  Valid:   {}", self.valid.to_string().green())?;
        if self.invalid > 0 {
            writeln!(w, "  Invalid: {}", self.invalid.to_string().red().bold())?;
        } else {
            writeln!(w, "  Invalid: {}", self.invalid)?;
        }
        writeln!(w, "  Rules:   {}", self.rules)?;

        if !self.errors.is_empty() {
            writeln!(w)?;
            writeln!(w, "Errors:")?;
            for err in &self.errors {
                writeln!(w, "  {} {}", err.file.yellow(), err.error.red())?;
            }
        }
        Ok(())
    }
}
