//! ironcheck -- command-line entry point
//!
//! Parses arguments, loads configuration, initializes logging and dispatches
//! to the subcommand handlers. Errors are printed to stderr and mapped to
//! process exit codes by [`CliError::exit_code`].

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use clap::Parser;

use ironcheck_core::config::IroncheckConfig;

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(err.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    // `config` subcommands report their own load errors.
    let config = match commands::load_effective_config(&cli.config).await {
        Ok(config) => config,
        Err(_) if matches!(cli.command, Commands::Config(_)) => IroncheckConfig::default(),
        Err(e) => return Err(e),
    };

    logging::init_tracing(&config.general, cli.log_level.as_deref())
        .map_err(|e| CliError::Config(format!("{e:#}")))?;
    ironcheck_core::metrics::describe_metrics();

    tracing::debug!(config = %cli.config.display(), "ironcheck starting");

    let writer = OutputWriter::new(cli.output);
    match cli.command {
        Commands::Analyze(args) => commands::analyze::execute(args, &config, &writer).await,
        Commands::Rules(args) => commands::rules::execute(args, &config, &writer).await,
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
    }
}
