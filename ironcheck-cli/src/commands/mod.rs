//! Command handlers -- one module per subcommand

pub mod analyze;
pub mod config;
pub mod rules;

use std::path::Path;

use ironcheck_core::config::IroncheckConfig;

use crate::error::CliError;

/// Default configuration file name used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "ironcheck.toml";

/// Load the effective configuration.
///
/// A missing file at the default location falls back to built-in defaults
/// (env overrides still apply). An explicitly named file must exist.
pub async fn load_effective_config(path: &Path) -> Result<IroncheckConfig, CliError> {
    if path == Path::new(DEFAULT_CONFIG_PATH) && !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        let mut config = IroncheckConfig::default();
        config.apply_env_overrides();
        config.validate()?;
        return Ok(config);
    }
    Ok(IroncheckConfig::load(path).await?)
}
