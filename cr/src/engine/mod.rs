//! Check execution
//!
//! The checker never runs a check itself. It asks an [`Engine`] for a
//! [`Runnable`] and drives it to completion. Retries, timeouts and result
//! reporting are the engine's business.

mod command;

pub use command::{CommandCheck, CommandEngine, CommandOutcome};

use async_trait::async_trait;

use crate::domain::Check;

/// Turns checks into runnable executions
pub trait Engine: Send + Sync {
    /// Prepare the execution of one check
    fn new_check(&self, check: Check) -> Box<dyn Runnable>;
}

/// A prepared check execution
///
/// Any error is reported by the implementation; callers get nothing back.
#[async_trait]
pub trait Runnable: Send {
    async fn run(self: Box<Self>);
}
