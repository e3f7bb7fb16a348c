//! Sources of started checks
//!
//! A [`CheckSource`] returns a point-in-time snapshot of the checks that are
//! currently eligible to run. The checker calls it once per pass.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::Check;

/// Enumerates started checks
#[async_trait]
pub trait CheckSource: Send + Sync {
    /// Snapshot of every check currently waiting to run
    async fn started_checks(&self) -> Result<Vec<Check>>;
}

/// On-disk layout read by [`FileCheckSource`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckFile {
    #[serde(default)]
    pub checks: Vec<Check>,
}

/// Reads started checks from a YAML file on every fetch
///
/// Whatever writes the file owns the check lifecycle; each fetch simply
/// reflects its current contents.
#[derive(Debug, Clone)]
pub struct FileCheckSource {
    path: PathBuf,
}

impl FileCheckSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        debug!(path = %path.display(), "FileCheckSource::new: called");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CheckSource for FileCheckSource {
    async fn started_checks(&self) -> Result<Vec<Check>> {
        debug!(path = %self.path.display(), "FileCheckSource::started_checks: called");
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read checks file {}", self.path.display()))?;

        let file: CheckFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse checks file {}", self.path.display()))?;

        debug!(count = file.checks.len(), "FileCheckSource::started_checks: loaded");
        Ok(file.checks)
    }
}
