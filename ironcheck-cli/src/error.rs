//! CLI-specific error types and exit code mapping

use ironcheck_core::error::IroncheckError;
use ironcheck_resolver::ResolverError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to standard Unix exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// Component input could not be read or parsed.
    #[error("input error: {0}")]
    Input(String),

    /// Analysis finished and reported vulnerabilities remain.
    #[error("{0}")]
    Findings(String),

    /// Rule file validation failure.
    #[error("rule error: {0}")]
    Rule(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from ironcheck-core.
    #[error("{0}")]
    Core(#[from] IroncheckError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                 |
    /// |------|-----------------------------------------|
    /// | 0    | Success                                 |
    /// | 1    | General / command error                 |
    /// | 2    | Configuration error                     |
    /// | 3    | Invalid component input                 |
    /// | 4    | Reported vulnerabilities remain         |
    /// | 10   | IO error                                |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Core(IroncheckError::Config(_)) => 2,
            Self::Input(_) => 3,
            Self::Findings(_) => 4,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Core(_) | Self::Rule(_) => 1,
        }
    }
}

impl From<ResolverError> for CliError {
    fn from(e: ResolverError) -> Self {
        match &e {
            ResolverError::Config { .. } => Self::Config(e.to_string()),
            ResolverError::RuleLoad { .. }
            | ResolverError::RuleParse { .. }
            | ResolverError::Pattern { .. } => Self::Rule(e.to_string()),
            _ => Self::Command(e.to_string()),
        }
    }
}
