//! CheckRunner - drives checker passes on a fixed cadence
//!
//! The runner is responsible for:
//! - Ticking `Checker::run_once` every interval
//! - Logging failed passes and retrying on the next tick
//! - Draining in-flight checks on shutdown, bounded by a timeout

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::CheckerConfig;
use super::core::Checker;
use crate::error::CheckerError;

/// How the runner finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerExit {
    /// Every in-flight check finished before the drain timeout
    Drained { passes: u64 },
    /// Checks were still running when the drain timeout expired
    TimedOut { passes: u64, in_flight: usize },
}

/// Periodic driver for a [`Checker`]
pub struct CheckRunner {
    checker: Arc<Checker>,
    interval: Duration,
    drain_timeout: Duration,
}

impl CheckRunner {
    /// Create a runner ticking every `interval`; a zero interval is rejected
    pub fn new(checker: Arc<Checker>, interval: Duration, drain_timeout: Duration) -> Result<Self, CheckerError> {
        debug!(?interval, ?drain_timeout, "CheckRunner::new: called");
        if interval.is_zero() {
            return Err(CheckerError::InvalidInterval);
        }

        Ok(Self {
            checker,
            interval,
            drain_timeout,
        })
    }

    pub fn from_config(checker: Arc<Checker>, config: &CheckerConfig) -> Result<Self, CheckerError> {
        Self::new(checker, config.interval(), config.drain_timeout())
    }

    /// Run passes until `cancel` fires, then drain
    ///
    /// A pass blocked on the budget when `cancel` fires is abandoned: checks it
    /// already launched keep running, the rest wait for the next process.
    pub async fn run(&self, cancel: CancellationToken) -> RunnerExit {
        info!(interval_ms = self.interval.as_millis() as u64, "check runner started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut passes = 0_u64;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("check runner shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    passes += 1;
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            info!("check runner shutting down mid-pass");
                            break;
                        }
                        result = self.checker.run_once(&cancel) => match result {
                            Ok(summary) => debug!(?summary, "CheckRunner::run: pass complete"),
                            Err(CheckerError::Cancelled) => break,
                            Err(e) if e.is_transient() => warn!(error = %e, "check pass failed, retrying next tick"),
                            Err(e) => error!(error = %e, "check pass failed"),
                        },
                    }
                }
            }
        }

        self.drain(passes).await
    }

    async fn drain(&self, passes: u64) -> RunnerExit {
        info!(in_flight = self.checker.in_flight(), "draining in-flight checks");
        match tokio::time::timeout(self.drain_timeout, self.checker.drain()).await {
            Ok(Ok(())) => {
                info!(passes, "check runner stopped");
                RunnerExit::Drained { passes }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "drain failed");
                RunnerExit::TimedOut {
                    passes,
                    in_flight: self.checker.in_flight(),
                }
            }
            Err(_) => {
                let in_flight = self.checker.in_flight();
                warn!(in_flight, "drain timed out, leaving checks running");
                RunnerExit::TimedOut { passes, in_flight }
            }
        }
    }
}
