//! Signal service CLI application.

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use pulse_monitor::{setup_logging, LogFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging config comes from the file; CLI flags override it. A broken
    // config file falls back to default logging here and surfaces as a
    // proper error inside the command.
    let logging = pulse_config::load_config(&cli.config)
        .map(|c| c.logging)
        .unwrap_or_default();
    let level = match cli.log_level {
        Some(level) => level.as_str(),
        None => logging.level.as_str(),
    };
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::from_config(&logging.format)
    };
    setup_logging(level, format);

    // Execute command
    match cli.command {
        Commands::Serve(args) => cli::commands::serve::run(args, &cli.config).await,
        Commands::Trigger(args) => cli::commands::trigger::run(args, &cli.config).await,
        Commands::Signals(args) => cli::commands::signals::run(args, &cli.config).await,
        Commands::Strategies => cli::commands::strategies::run().await,
        Commands::ValidateConfig => cli::commands::validate::run(&cli.config).await,
    }
}
