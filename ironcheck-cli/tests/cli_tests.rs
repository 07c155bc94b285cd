//! End-to-end tests for the `ironcheck` binary.
//!
//! Each test writes a config file into a temp dir pointing at the bundled
//! fixtures and inspects stdout and the exit code.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn write_config(dir: &TempDir, extra: &str) -> PathBuf {
    let path = dir.path().join("ironcheck.toml");
    let content = format!(
        r#"
[general]
log_level = "warn"
log_format = "json"

[data]
index_path = "{}"
database_path = "{}"
{extra}
"#,
        fixture("index.json").display(),
        fixture("vulnerabilities.json").display(),
    );
    std::fs::write(&path, content).expect("should write config");
    path
}

fn ironcheck(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ironcheck"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("should run ironcheck binary")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn test_analyze_reports_struts_vulnerabilities() {
    let dir = TempDir::new().expect("should create temp dir");
    let config = write_config(&dir, "");
    let input = fixture("components.json");

    let output = ironcheck(
        &config,
        &["analyze", input.to_str().unwrap(), "--output", "json"],
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let report = stdout_json(&output);
    assert_eq!(report["components"], 2);
    assert_eq!(report["identified"], 1);
    assert_eq!(report["vulnerabilities"], 2);
    assert_eq!(report["findings"][0]["identifiers"][0], "cpe:/a:apache:struts:2.3.20");
}

#[test]
fn test_analyze_min_severity_and_fail_on_findings() {
    let dir = TempDir::new().expect("should create temp dir");
    let config = write_config(&dir, "");
    let input = fixture("components.json");

    let output = ironcheck(
        &config,
        &[
            "analyze",
            input.to_str().unwrap(),
            "--min-severity",
            "critical",
            "--fail-on-findings",
            "--output",
            "json",
        ],
    );
    assert_eq!(output.status.code(), Some(4));
    let report = stdout_json(&output);
    assert_eq!(report["vulnerabilities"], 1);
    assert_eq!(report["findings"][0]["vulnerabilities"][0]["name"], "CVE-2017-5638");
}

#[test]
fn test_analyze_applies_configured_suppressions() {
    let dir = TempDir::new().expect("should create temp dir");
    let rules = format!(
        "\n[rules]\nsuppression_paths = [\"{}\"]\n",
        fixture("rules").display()
    );
    let config = write_config(&dir, &rules);
    let input = fixture("components.json");
    let out_path = dir.path().join("analyzed.json");

    let output = ironcheck(
        &config,
        &[
            "analyze",
            input.to_str().unwrap(),
            "--components-out",
            out_path.to_str().unwrap(),
            "--output",
            "json",
        ],
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let report = stdout_json(&output);
    assert_eq!(report["vulnerabilities"], 1);
    assert_eq!(report["suppressed"], 1);

    let analyzed: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&out_path).expect("components written"))
            .expect("components JSON");
    let struts = &analyzed[0];
    assert_eq!(struts["suppressed_vulnerabilities"][0]["name"], "CVE-2016-3081");
    assert_eq!(
        struts["suppressed_vulnerabilities"][0]["notes"],
        "request parsing is disabled in this deployment"
    );
}

#[test]
fn test_analyze_invalid_input_exit_code() {
    let dir = TempDir::new().expect("should create temp dir");
    let config = write_config(&dir, "");
    let input = dir.path().join("broken.json");
    std::fs::write(&input, "{ not a list").expect("should write input");

    let output = ironcheck(&config, &["analyze", input.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn test_rules_validate_fixture_directory() {
    let dir = TempDir::new().expect("should create temp dir");
    let config = write_config(&dir, "");

    let output = ironcheck(
        &config,
        &["rules", "validate", fixture("rules").to_str().unwrap(), "--output", "json"],
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let report = stdout_json(&output);
    assert_eq!(report["valid"], 1);
    assert_eq!(report["rules"], 1);
}

#[test]
fn test_rules_validate_invalid_hint_file() {
    let dir = TempDir::new().expect("should create temp dir");
    let config = write_config(&dir, "");
    let hint = dir.path().join("hints.yaml");
    std::fs::write(&hint, "hints: {").expect("should write hint file");

    let output = ironcheck(
        &config,
        &["rules", "validate", hint.to_str().unwrap(), "--kind", "hint"],
    );
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_config_show_section() {
    let dir = TempDir::new().expect("should create temp dir");
    let config = write_config(&dir, "");

    let output = ironcheck(&config, &["config", "show", "--section", "data"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("index_path"));
    assert!(stdout.contains("vulnerabilities.json"));
}

#[test]
fn test_config_validate_reports_invalid_file() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[search]\nmin_score = 7.5\n").expect("should write config");

    let output = ironcheck(&path, &["config", "validate", "--output", "json"]);
    assert_eq!(output.status.code(), Some(2));
    let report = stdout_json(&output);
    assert_eq!(report["valid"], false);
}
