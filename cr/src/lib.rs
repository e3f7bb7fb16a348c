//! checkrunner - bounded-concurrency admission control for resource checks
//!
//! A [`Checker`] periodically fetches the started checks from a
//! [`CheckSource`], skips the ones already running, and launches the rest on
//! an [`Engine`] without ever exceeding a fixed number of concurrent checks.
//!
//! # Modules
//!
//! - [`checker`] - Dispatch pass, in-flight registry, metrics and runner
//! - [`domain`] - Check and check identity
//! - [`source`] - Check sources
//! - [`engine`] - Check execution
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod checker;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod source;

// Re-export commonly used types
pub use checker::{
    CheckRunner, Checker, CheckerConfig, CheckerMetrics, InFlightEntry, InFlightRegistry, MetricsSnapshot,
    PassSummary, RunnerExit,
};
pub use config::{Config, ExecutorConfig, SourceConfig};
pub use domain::{Check, CheckId};
pub use engine::{CommandCheck, CommandEngine, CommandOutcome, Engine, Runnable};
pub use error::CheckerError;
pub use source::{CheckFile, CheckSource, FileCheckSource};
