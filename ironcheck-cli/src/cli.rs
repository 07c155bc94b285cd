//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// ironcheck -- evidence-based dependency identification.
///
/// Use `ironcheck <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "ironcheck", version, about, long_about = None)]
pub struct Cli {
    /// Path to the ironcheck.toml configuration file.
    #[arg(short, long, default_value = "ironcheck.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Identify components and report their vulnerabilities.
    Analyze(AnalyzeArgs),

    /// Manage suppression and hint rules.
    Rules(RulesArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- analyze ----

/// Run the identification pipeline over a component list.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// JSON file with the components to analyze.
    pub input: PathBuf,

    /// Minimum severity to report (info, low, medium, high, critical).
    #[arg(long, default_value = "low")]
    pub min_severity: String,

    /// Write the fully analyzed components as JSON to this file.
    #[arg(long)]
    pub components_out: Option<PathBuf>,

    /// Exit with a non-zero code when reported vulnerabilities remain.
    #[arg(long)]
    pub fail_on_findings: bool,
}

// ---- rules ----

/// Manage suppression and hint rules.
#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub action: RulesAction,
}

#[derive(Subcommand, Debug)]
pub enum RulesAction {
    /// Validate rule files without running an analysis.
    Validate {
        /// Rule file or directory containing YAML rule files.
        path: PathBuf,

        /// Rule file kind.
        #[arg(long, default_value = "suppression")]
        kind: RuleKind,
    },
}

/// Rule file kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RuleKind {
    /// Suppression rules (`suppressions:`).
    Suppression,
    /// Hint rules (`hints:` / `vendor_duplicating:`).
    Hint,
}

// ---- config ----

/// Manage ironcheck configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, search, analyzers, rules, data).
        #[arg(long)]
        section: Option<String>,
    },
}
