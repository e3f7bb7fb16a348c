//! Checker error types

use thiserror::Error;

/// Errors returned by a dispatch pass
#[derive(Debug, Error)]
pub enum CheckerError {
    #[error("max in-flight checks must be at least 1, got {0}")]
    InvalidCapacity(u32),

    #[error("check interval must be non-zero")]
    InvalidInterval,

    #[error("failed to fetch started checks: {0:#}")]
    Fetch(eyre::Report),

    #[error("pass cancelled before checks were fetched")]
    Cancelled,

    #[error("concurrency budget closed")]
    BudgetClosed,
}

impl CheckerError {
    /// Check if the next pass may succeed where this one failed
    pub fn is_transient(&self) -> bool {
        matches!(self, CheckerError::Fetch(_))
    }
}
