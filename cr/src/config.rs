//! checkrunner configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::checker::CheckerConfig;

/// Main checkrunner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Admission limits and cadence
    pub checker: CheckerConfig,

    /// Where started checks come from
    pub source: SourceConfig,

    /// How checks are executed
    pub executor: ExecutorConfig,
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if self.checker.max_in_flight == 0 {
            return Err(eyre::eyre!("checker.max-in-flight must be at least 1"));
        }
        if self.checker.interval_ms == 0 {
            return Err(eyre::eyre!("checker.interval-ms must be greater than 0"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .checkrunner.yml
        let local_config = PathBuf::from(".checkrunner.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/checkrunner/checkrunner.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("checkrunner").join("checkrunner.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Check source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// YAML file listing started checks
    #[serde(rename = "checks-file")]
    pub checks_file: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            checks_file: PathBuf::from("checks.yml"),
        }
    }
}

/// Command executor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Shell used to run check commands
    pub shell: String,

    /// Command run for checks without a plan
    #[serde(rename = "default-command")]
    pub default_command: String,

    /// Per-check timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            default_command: "true".to_string(),
            timeout_ms: 3_600_000,
        }
    }
}

impl ExecutorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
