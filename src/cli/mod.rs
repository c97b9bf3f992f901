//! CLI definitions.

pub mod commands;
pub mod wiring;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pulse")]
#[command(author, version, about = "Market quote ingestion and realtime signal push")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Log level (overrides the config file's logging.level)
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the scheduler and the websocket broadcaster
    Serve(ServeArgs),
    /// Run one job to completion and exit
    Trigger(TriggerArgs),
    /// One-shot refresh, then print the current signal listing
    Signals(SignalsArgs),
    /// List available strategies
    Strategies,
    /// Validate configuration
    ValidateConfig,
}

#[derive(clap::Args)]
pub struct ServeArgs {
    /// Websocket bind address (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Skip the initial full refresh on startup
    #[arg(long)]
    pub no_bootstrap: bool,
}

#[derive(clap::Args)]
pub struct TriggerArgs {
    /// Job to run
    #[arg(short, long)]
    pub job: JobKind,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum JobKind {
    QuoteRefresh,
    SignalRecompute,
    FullRefresh,
}

#[derive(clap::Args)]
pub struct SignalsArgs {
    /// Only list signals of this strategy
    #[arg(short, long)]
    pub strategy: Option<String>,

    /// Maximum rows to print
    #[arg(short = 'n', long, default_value = "30")]
    pub limit: usize,
}
