//! Checker configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Checker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    /// Max checks running at once
    #[serde(rename = "max-in-flight")]
    pub max_in_flight: u32,

    /// Time between passes in milliseconds
    #[serde(rename = "interval-ms")]
    pub interval_ms: u64,

    /// How long shutdown waits for in-flight checks, in milliseconds
    #[serde(rename = "drain-timeout-ms")]
    pub drain_timeout_ms: u64,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 32,
            interval_ms: 10_000,
            drain_timeout_ms: 60_000,
        }
    }
}

impl CheckerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}
