//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// checkrunner - bounded-concurrency check dispatcher
#[derive(Parser)]
#[command(
    name = "cr",
    about = "Admit started resource checks into bounded-concurrency execution",
    version,
    after_help = "Logs are written to: ~/.local/share/checkrunner/logs/checkrunner.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level override
    #[arg(long, global = true, help = "Log level (trace, debug, info, warn, error)")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Run check passes on the configured interval until interrupted
    Run {
        /// Checks file (overrides source.checks-file)
        #[arg(long)]
        checks: Option<PathBuf>,
    },

    /// Run a single pass and wait for its checks to finish
    Once {
        /// Checks file (overrides source.checks-file)
        #[arg(long)]
        checks: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective configuration
    Config,
}

/// Output format for pass results
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

/// Resolve the log level: CLI flag first, then config, then INFO
pub fn resolve_log_level(cli_level: Option<&str>, config_level: Option<&str>) -> tracing::Level {
    match cli_level.or(config_level).map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
