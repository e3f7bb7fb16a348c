//! checkrunner - bounded-concurrency check dispatcher
//!
//! CLI entry point for running check passes.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use checkrunner::checker::{CheckRunner, Checker, RunnerExit};
use checkrunner::cli::{Cli, Command, OutputFormat, resolve_log_level};
use checkrunner::config::Config;
use checkrunner::engine::CommandEngine;
use checkrunner::source::FileCheckSource;

fn setup_logging(level: tracing::Level) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("checkrunner")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Setup tracing subscriber - write to log file, not stdout/stderr
    let log_file = fs::File::create(log_dir.join("checkrunner.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!(%level, "Logging initialized");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging
    let level = resolve_log_level(cli.log_level.as_deref(), config.log_level.as_deref());
    setup_logging(level).context("Failed to setup logging")?;

    // Dispatch command
    match cli.command {
        Command::Run { checks } => cmd_run(&config, checks).await,
        Command::Once { checks, format } => cmd_once(&config, checks, format).await,
        Command::Config => cmd_config(&config),
    }
}

/// Build the checker from configuration
fn build_checker(config: &Config, checks: Option<PathBuf>) -> Result<Arc<Checker>> {
    config.validate()?;

    let checks_file = checks.unwrap_or_else(|| config.source.checks_file.clone());
    info!(checks_file = %checks_file.display(), "Using checks file");

    let source = Arc::new(FileCheckSource::new(checks_file));
    let engine = Arc::new(CommandEngine::new(config.executor.clone()));
    let checker = Checker::from_config(source, engine, &config.checker)
        .context("Failed to create checker")?;

    Ok(Arc::new(checker))
}

/// Run passes until Ctrl-C
async fn cmd_run(config: &Config, checks: Option<PathBuf>) -> Result<()> {
    let checker = build_checker(config, checks)?;
    let runner = CheckRunner::from_config(checker, &config.checker)
        .context("Failed to create check runner")?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received");
            }
            cancel.cancel();
        });
    }

    println!(
        "checkrunner running (max in flight: {}, interval: {}ms). Press Ctrl-C to stop.",
        config.checker.max_in_flight, config.checker.interval_ms
    );

    match runner.run(cancel).await {
        RunnerExit::Drained { passes } => {
            println!("Stopped after {} passes", passes);
            Ok(())
        }
        RunnerExit::TimedOut { passes, in_flight } => Err(eyre::eyre!(
            "Stopped after {} passes with {} checks still running",
            passes,
            in_flight
        )),
    }
}

/// Run one pass and wait for it
async fn cmd_once(config: &Config, checks: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let checker = build_checker(config, checks)?;

    let summary = checker
        .run_once(&CancellationToken::new())
        .await
        .context("Check pass failed")?;

    tokio::time::timeout(config.checker.drain_timeout(), checker.drain())
        .await
        .context("Timed out waiting for checks to finish")??;

    let metrics = checker.metrics();

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "pass": summary,
                "metrics": metrics,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("Check pass");
            println!("----------");
            println!("Fetched:  {}", summary.fetched);
            println!("Launched: {}", summary.launched);
            println!("Skipped:  {}", summary.skipped);
            println!("Panicked: {}", metrics.checks_panicked);
        }
    }

    Ok(())
}

/// Print the effective configuration
fn cmd_config(config: &Config) -> Result<()> {
    print!("{}", serde_yaml::to_string(config)?);
    Ok(())
}
