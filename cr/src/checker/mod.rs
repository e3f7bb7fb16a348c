//! Check admission and dispatch
//!
//! The [`Checker`] admits started checks into bounded-concurrency execution:
//! - At most one execution per check id at any instant
//! - At most `max-in-flight` executions overall
//! - Slot and registry cleanup on every exit path, panics included
//!
//! [`CheckRunner`] calls the checker on a fixed cadence.

mod config;
mod core;
mod metrics;
mod registry;
mod runner;

pub use config::CheckerConfig;
pub use core::{Checker, PassSummary};
pub use metrics::{CheckerMetrics, MetricsSnapshot};
pub use registry::{InFlightEntry, InFlightRegistry};
pub use runner::{CheckRunner, RunnerExit};
