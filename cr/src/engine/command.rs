//! Shell command engine

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use super::{Engine, Runnable};
use crate::config::ExecutorConfig;
use crate::domain::Check;

/// Runs each check as a shell command
///
/// The command line is the check's plan, or the configured default when the
/// check carries none.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    config: ExecutorConfig,
}

impl CommandEngine {
    pub fn new(config: ExecutorConfig) -> Self {
        debug!(?config, "CommandEngine::new: called");
        Self { config }
    }

    /// Build the command check for one check
    pub fn prepare(&self, check: Check) -> CommandCheck {
        debug!(check_id = %check.id, "CommandEngine::prepare: called");
        let command_line = check
            .plan
            .clone()
            .unwrap_or_else(|| self.config.default_command.clone());

        CommandCheck {
            check,
            shell: self.config.shell.clone(),
            command_line,
            timeout: self.config.timeout(),
        }
    }
}

impl Engine for CommandEngine {
    fn new_check(&self, check: Check) -> Box<dyn Runnable> {
        Box::new(self.prepare(check))
    }
}

/// Outcome of one command check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Succeeded,
    Failed { code: Option<i32>, stderr: String },
    SpawnFailed(String),
    TimedOut,
}

/// One prepared shell command check
#[derive(Debug)]
pub struct CommandCheck {
    check: Check,
    shell: String,
    command_line: String,
    timeout: Duration,
}

impl CommandCheck {
    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// Run the command and return its outcome without logging it
    pub async fn execute(&self) -> CommandOutcome {
        debug!(check_id = %self.check.id, command = %self.command_line, "CommandCheck::execute: called");
        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(&self.command_line)
            .env("CHECK_ID", self.check.id.to_string())
            .env("CHECK_TEAM", &self.check.team_name)
            .env("CHECK_PIPELINE", &self.check.pipeline_name)
            .env(
                "CHECK_RESOURCE_CONFIG_SCOPE_ID",
                self.check.resource_config_scope_id.to_string(),
            )
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => return CommandOutcome::SpawnFailed(e.to_string()),
        };

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => CommandOutcome::Succeeded,
            Ok(Ok(output)) => CommandOutcome::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            },
            Ok(Err(e)) => CommandOutcome::SpawnFailed(e.to_string()),
            Err(_) => CommandOutcome::TimedOut,
        }
    }
}

#[async_trait]
impl Runnable for CommandCheck {
    async fn run(self: Box<Self>) {
        let check_id = self.check.id;
        match self.execute().await {
            CommandOutcome::Succeeded => info!(%check_id, "check succeeded"),
            CommandOutcome::Failed { code, stderr } => {
                warn!(%check_id, ?code, %stderr, "check failed")
            }
            CommandOutcome::SpawnFailed(reason) => {
                error!(%check_id, %reason, "check command could not run")
            }
            CommandOutcome::TimedOut => {
                error!(%check_id, timeout_ms = self.timeout.as_millis() as u64, "check timed out")
            }
        }
    }
}
