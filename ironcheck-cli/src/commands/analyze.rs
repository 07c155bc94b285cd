//! `ironcheck analyze` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use ironcheck_core::Component;
use ironcheck_core::config::IroncheckConfig;
use ironcheck_core::types::Severity;
use ironcheck_resolver::Engine;

use crate::cli::AnalyzeArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `analyze` command.
///
/// Reads a JSON array of components, runs the full identification pipeline,
/// and renders a findings report. Optionally writes the analyzed components
/// (with evidence, identifiers and related entries) as JSON.
pub async fn execute(
    args: AnalyzeArgs,
    config: &IroncheckConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let min_severity = Severity::from_str_loose(&args.min_severity).ok_or_else(|| {
        CliError::Command(format!(
            "invalid severity '{}' (expected: info, low, medium, high, critical)",
            args.min_severity
        ))
    })?;

    let components = read_components(&args.input).await?;
    info!(
        input = %args.input.display(),
        components = components.len(),
        "starting analysis"
    );

    let engine = Engine::from_config(config).await?;
    let analyzed = engine.analyze(components).await?;
    let unused_rules = engine
        .unused_suppression_rules()
        .iter()
        .map(|rule| rule.to_string())
        .collect();

    if let Some(out) = &args.components_out {
        let json = serde_json::to_vec_pretty(&analyzed)?;
        tokio::fs::write(out, json).await?;
        info!(path = %out.display(), "wrote analyzed components");
    }

    let report = AnalysisReport::build(
        args.input.display().to_string(),
        &analyzed,
        min_severity,
        unused_rules,
    );
    writer.render(&report)?;

    if args.fail_on_findings && report.vulnerabilities > 0 {
        return Err(CliError::Findings(format!(
            "{} vulnerabilities at or above {} reported",
            report.vulnerabilities, min_severity
        )));
    }
    Ok(())
}

/// Read and decode the component list.
async fn read_components(path: &Path) -> Result<Vec<Component>, CliError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CliError::Input(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| CliError::Input(format!("{}: {e}", path.display())))
}

/// Summary of one analysis run.
#[derive(Serialize)]
pub struct AnalysisReport {
    pub input: String,
    pub min_severity: Severity,
    /// Components left after bundling
    pub components: usize,
    /// Components merged into another one
    pub related: usize,
    /// Components with at least one CPE
    pub identified: usize,
    /// Vulnerabilities at or above `min_severity`
    pub vulnerabilities: usize,
    /// Vulnerabilities removed by suppression rules
    pub suppressed: usize,
    pub findings: Vec<Finding>,
    pub unused_suppression_rules: Vec<String>,
}

/// A component with reportable vulnerabilities.
#[derive(Serialize)]
pub struct Finding {
    pub file_path: String,
    pub identifiers: Vec<String>,
    pub vulnerabilities: Vec<FindingVulnerability>,
}

#[derive(Serialize)]
pub struct FindingVulnerability {
    pub name: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cvss_score: Option<f64>,
}

impl AnalysisReport {
    pub fn build(
        input: String,
        components: &[Component],
        min_severity: Severity,
        unused_suppression_rules: Vec<String>,
    ) -> Self {
        let mut findings = Vec::new();
        for component in components {
            let vulnerabilities: Vec<_> = component
                .vulnerabilities
                .iter()
                .filter(|v| v.severity >= min_severity)
                .map(|v| FindingVulnerability {
                    name: v.name.clone(),
                    severity: v.severity,
                    cvss_score: v.cvss_score,
                })
                .collect();
            if vulnerabilities.is_empty() {
                continue;
            }
            findings.push(Finding {
                file_path: component.file_path.clone(),
                identifiers: component
                    .vulnerable_software_identifiers
                    .iter()
                    .map(|id| id.value.clone())
                    .collect(),
                vulnerabilities,
            });
        }

        Self {
            input,
            min_severity,
            components: components.len(),
            related: components.iter().map(|c| c.related.len()).sum(),
            identified: components
                .iter()
                .filter(|c| !c.vulnerable_software_identifiers.is_empty())
                .count(),
            vulnerabilities: findings.iter().map(|f| f.vulnerabilities.len()).sum(),
            suppressed: components
                .iter()
                .map(|c| c.suppressed_vulnerabilities.len())
                .sum(),
            findings,
            unused_suppression_rules,
        }
    }
}

fn colored_severity(severity: Severity) -> colored::ColoredString {
    use colored::Colorize;

    let label = severity.to_string();
    match severity {
        Severity::Critical => label.red().bold(),
        Severity::High => label.red(),
        Severity::Medium => label.yellow(),
        Severity::Low => label.normal(),
        Severity::Info => label.dimmed(),
    }
}

impl Render for AnalysisReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Analysis: {}", self.input.bold())?;
        writeln!(w, "  Components:      {}", self.components)?;
        writeln!(w, "  Related:         {}", self.related)?;
        writeln!(w, "  Identified:      {}", self.identified)?;
        writeln!(
            w,
            "  Vulnerabilities: {} (>= {})",
            self.vulnerabilities.to_string().bold(),
            self.min_severity
        )?;
        writeln!(w, "  Suppressed:      {}", self.suppressed)?;

        if self.findings.is_empty() {
            writeln!(w)?;
            writeln!(w, "{}", "No vulnerabilities found.".green())?;
        } else {
            writeln!(w)?;
            writeln!(w, "{:<12} {:<8} {:<20} {}", "Severity", "CVSS", "Name", "Component")?;
            writeln!(w, "{}", "-".repeat(80))?;
            for finding in &self.findings {
                for vuln in &finding.vulnerabilities {
                    let cvss = vuln
                        .cvss_score
                        .map_or_else(|| "-".to_owned(), |s| format!("{s:.1}"));
                    writeln!(
                        w,
                        "{:<12} {:<8} {:<20} {}",
                        colored_severity(vuln.severity),
                        cvss,
                        vuln.name,
                        finding.file_path
                    )?;
                }
                if !finding.identifiers.is_empty() {
                    writeln!(w, "{:<42} {}", "", finding.identifiers.join(", ").dimmed())?;
                }
            }
        }

        if !self.unused_suppression_rules.is_empty() {
            writeln!(w)?;
            writeln!(
                w,
                "{}",
                format!(
                    "{} suppression rules matched nothing:",
                    self.unused_suppression_rules.len()
                )
                .yellow()
            )?;
            for rule in &self.unused_suppression_rules {
                writeln!(w, "  {rule}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironcheck_core::types::Vulnerability;

    fn vuln(name: &str, severity: Severity) -> Vulnerability {
        Vulnerability {
            name: name.to_owned(),
            description: String::new(),
            severity,
            cvss_score: None,
            cwes: Vec::new(),
            notes: None,
        }
    }

    fn sample() -> Vec<Component> {
        let mut vulnerable = Component::new("/app/lib/struts2-core-2.3.20.jar");
        vulnerable.vulnerabilities.insert(vuln("CVE-2017-5638", Severity::Critical));
        vulnerable.vulnerabilities.insert(vuln("CVE-0000-0001", Severity::Low));
        vulnerable
            .suppressed_vulnerabilities
            .insert(vuln("CVE-2016-3081", Severity::High));
        vulnerable.related.push(Component::new("/other/struts2-core-2.3.20.jar"));

        let clean = Component::new("/app/lib/commons-io-2.11.0.jar");
        vec![vulnerable, clean]
    }

    #[test]
    fn test_report_counts() {
        let report = AnalysisReport::build("in.json".to_owned(), &sample(), Severity::Low, Vec::new());
        assert_eq!(report.components, 2);
        assert_eq!(report.related, 1);
        assert_eq!(report.vulnerabilities, 2);
        assert_eq!(report.suppressed, 1);
        assert_eq!(report.findings.len(), 1);
    }

    #[test]
    fn test_report_filters_by_min_severity() {
        let report =
            AnalysisReport::build("in.json".to_owned(), &sample(), Severity::High, Vec::new());
        assert_eq!(report.vulnerabilities, 1);
        assert_eq!(report.findings[0].vulnerabilities[0].name, "CVE-2017-5638");
    }

    #[test]
    fn test_render_text_without_findings() {
        let report = AnalysisReport::build(
            "in.json".to_owned(),
            &[Component::new("/lib/a.jar")],
            Severity::Low,
            vec!["cpe=cpe:/a:example:nothing".to_owned()],
        );
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).unwrap();
        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("No vulnerabilities found."));
        assert!(output.contains("cpe:/a:example:nothing"));
    }

    #[test]
    fn test_report_json_shape() {
        let report =
            AnalysisReport::build("in.json".to_owned(), &sample(), Severity::Info, Vec::new());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["min_severity"], "Info");
        assert_eq!(json["findings"][0]["vulnerabilities"][0]["name"], "CVE-0000-0001");
    }
}
