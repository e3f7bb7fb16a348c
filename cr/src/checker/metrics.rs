//! Checker metrics
//!
//! Tracks per-pass and per-check counters:
//! - Queue size of the most recent pass (gauge)
//! - Passes run and fetch failures
//! - Checks started, finished, skipped as duplicates, and panicked

use std::sync::{PoisonError, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Thread-safe metrics sink shared by the pass loop and every check task
#[derive(Debug, Default)]
pub struct CheckerMetrics {
    checks_queue_size: AtomicU64,
    passes: AtomicU64,
    fetch_failures: AtomicU64,
    checks_started: AtomicU64,
    checks_finished: AtomicU64,
    checks_skipped: AtomicU64,
    checks_panicked: AtomicU64,
    last_pass_at: RwLock<Option<DateTime<Utc>>>,
}

/// Point-in-time copy of [`CheckerMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub checks_queue_size: u64,
    pub passes: u64,
    pub fetch_failures: u64,
    pub checks_started: u64,
    pub checks_finished: u64,
    pub checks_skipped: u64,
    pub checks_panicked: u64,
    pub checks_in_flight: u64,
    pub last_pass_at: Option<DateTime<Utc>>,
}

impl CheckerMetrics {
    pub fn new() -> Self {
        debug!("CheckerMetrics::new: called");
        Self::default()
    }

    /// Record the start of a pass
    pub fn pass_started(&self) {
        self.passes.fetch_add(1, Ordering::Relaxed);
        *self.last_pass_at.write().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
    }

    pub fn fetch_failed(&self) {
        debug!("CheckerMetrics::fetch_failed: called");
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Set the queue size gauge to the size of the fetched snapshot
    pub fn set_queue_size(&self, size: usize) {
        debug!(size, "CheckerMetrics::set_queue_size: called");
        self.checks_queue_size.store(size as u64, Ordering::Relaxed);
    }

    pub fn check_skipped(&self) {
        self.checks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn check_started(&self) {
        self.checks_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn check_finished(&self) {
        self.checks_finished.fetch_add(1, Ordering::Relaxed);
    }

    pub fn check_panicked(&self) {
        self.checks_panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the counters; `checks_in_flight` comes from the registry
    pub fn snapshot(&self, checks_in_flight: usize) -> MetricsSnapshot {
        MetricsSnapshot {
            checks_queue_size: self.checks_queue_size.load(Ordering::Relaxed),
            passes: self.passes.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            checks_started: self.checks_started.load(Ordering::Relaxed),
            checks_finished: self.checks_finished.load(Ordering::Relaxed),
            checks_skipped: self.checks_skipped.load(Ordering::Relaxed),
            checks_panicked: self.checks_panicked.load(Ordering::Relaxed),
            checks_in_flight: checks_in_flight as u64,
            last_pass_at: *self.last_pass_at.read().unwrap_or_else(PoisonError::into_inner),
        }
    }
}
