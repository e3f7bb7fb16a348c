//! Checker implementation

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, info, info_span};
use uuid::Uuid;

use crate::domain::{Check, CheckId};
use crate::engine::Engine;
use crate::error::CheckerError;
use crate::source::CheckSource;

use super::config::CheckerConfig;
use super::metrics::{CheckerMetrics, MetricsSnapshot};
use super::registry::{InFlightEntry, InFlightRegistry};

/// What one pass did with its snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSummary {
    /// Checks returned by the source
    pub fetched: usize,
    /// Checks admitted and launched
    pub launched: usize,
    /// Checks skipped because they were already in flight
    pub skipped: usize,
}

/// The Checker admits started checks into bounded-concurrency execution.
///
/// Each pass fetches a snapshot from the source and launches every check that
/// is not already running, holding one slot of the concurrency budget per
/// launched check. Passes may overlap; they share the registry and budget.
pub struct Checker {
    source: Arc<dyn CheckSource>,
    engine: Arc<dyn Engine>,

    /// Ids admitted and not yet finished
    running: InFlightRegistry,

    /// Concurrency budget
    guard: Arc<Semaphore>,
    capacity: u32,

    metrics: Arc<CheckerMetrics>,
}

impl Checker {
    /// Create a checker that runs at most `max_in_flight` checks at once
    pub fn new(
        source: Arc<dyn CheckSource>,
        engine: Arc<dyn Engine>,
        max_in_flight: u32,
    ) -> Result<Self, CheckerError> {
        debug!(max_in_flight, "Checker::new: called");
        if max_in_flight == 0 {
            return Err(CheckerError::InvalidCapacity(max_in_flight));
        }

        Ok(Self {
            source,
            engine,
            running: InFlightRegistry::new(),
            guard: Arc::new(Semaphore::new(max_in_flight as usize)),
            capacity: max_in_flight,
            metrics: Arc::new(CheckerMetrics::new()),
        })
    }

    pub fn from_config(
        source: Arc<dyn CheckSource>,
        engine: Arc<dyn Engine>,
        config: &CheckerConfig,
    ) -> Result<Self, CheckerError> {
        Self::new(source, engine, config.max_in_flight)
    }

    /// Run one dispatch pass
    ///
    /// Returns once every check in the snapshot has been launched or skipped,
    /// without waiting for launched checks to finish. Blocks while the budget
    /// is exhausted. `cancel` only interrupts the fetch.
    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<PassSummary, CheckerError> {
        let pass = info_span!("checker.run", pass_id = %Uuid::now_v7());
        self.dispatch(cancel, &pass).instrument(pass.clone()).await
    }

    async fn dispatch(&self, cancel: &CancellationToken, pass: &Span) -> Result<PassSummary, CheckerError> {
        info!("start");
        self.metrics.pass_started();

        let checks = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("cancelled while fetching started checks");
                return Err(CheckerError::Cancelled);
            }
            fetched = self.source.started_checks() => match fetched {
                Ok(checks) => checks,
                Err(e) => {
                    error!(error = %format!("{e:#}"), "failed to fetch started checks");
                    self.metrics.fetch_failed();
                    return Err(CheckerError::Fetch(e));
                }
            },
        };

        self.metrics.set_queue_size(checks.len());

        let mut summary = PassSummary {
            fetched: checks.len(),
            ..Default::default()
        };

        for check in checks {
            let Some(entry) = self.running.try_insert(check.id) else {
                debug!(check_id = %check.id, "already in flight, skipping");
                self.metrics.check_skipped();
                summary.skipped += 1;
                continue;
            };

            // On error `entry` drops here and the id leaves the registry
            let permit = Arc::clone(&self.guard)
                .acquire_owned()
                .await
                .map_err(|_| CheckerError::BudgetClosed)?;

            self.launch(check, entry, permit, pass);
            summary.launched += 1;
        }

        info!(
            fetched = summary.fetched,
            launched = summary.launched,
            skipped = summary.skipped,
            "end"
        );
        Ok(summary)
    }

    fn launch(&self, check: Check, entry: InFlightEntry, permit: OwnedSemaphorePermit, pass: &Span) {
        let span = info_span!(
            parent: None,
            "checker.check",
            check_id = %check.id,
            team = %check.team_name,
            pipeline = %check.pipeline_name,
            resource_config_scope_id = check.resource_config_scope_id
        );
        span.follows_from(pass);

        self.metrics.check_started();
        let slot = CheckSlot {
            entry,
            _permit: permit,
            metrics: Arc::clone(&self.metrics),
        };
        let engine = Arc::clone(&self.engine);
        let metrics = Arc::clone(&self.metrics);
        let check_id = check.id;

        debug!(%check_id, "launching check");
        tokio::spawn(
            async move {
                let _slot = slot;

                let execution = AssertUnwindSafe(async move { engine.new_check(check).run().await });
                if let Err(panic) = execution.catch_unwind().await {
                    metrics.check_panicked();
                    error!(%check_id, panic = %panic_message(&*panic), "check panicked");
                }
            }
            .instrument(span),
        );
    }

    /// Wait until every in-flight check has finished
    ///
    /// Takes the whole budget for a moment, so passes running concurrently
    /// stall until it returns.
    pub async fn drain(&self) -> Result<(), CheckerError> {
        debug!(in_flight = self.in_flight(), "Checker::drain: called");
        if !self.running.is_empty() {
            info!(in_flight = self.running.len(), "waiting for in-flight checks to finish");
        }
        let all = self
            .guard
            .acquire_many(self.capacity)
            .await
            .map_err(|_| CheckerError::BudgetClosed)?;
        drop(all);
        debug!("Checker::drain: no checks in flight");
        Ok(())
    }

    /// Number of checks admitted and not yet finished
    pub fn in_flight(&self) -> usize {
        self.running.len()
    }

    pub fn is_in_flight(&self, id: CheckId) -> bool {
        self.running.contains(id)
    }

    /// Ids of checks admitted and not yet finished
    pub fn in_flight_ids(&self) -> Vec<CheckId> {
        self.running.ids()
    }

    /// Budget slots not currently held by a check
    pub fn available_slots(&self) -> usize {
        self.guard.available_permits()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.in_flight())
    }
}

/// Resources held by one launched check
///
/// Dropped exactly once when the check task ends, however it ends. Fields
/// drop in order: the registry entry first, then the budget slot.
struct CheckSlot {
    entry: InFlightEntry,
    _permit: OwnedSemaphorePermit,
    metrics: Arc<CheckerMetrics>,
}

impl Drop for CheckSlot {
    fn drop(&mut self) {
        debug!(check_id = %self.entry.id(), "releasing check slot");
        self.metrics.check_finished();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tracing::Subscriber;
    use tracing::field::{Field, Visit};
    use tracing::span::{Attributes, Id};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use tracing_subscriber::registry::LookupSpan;

    use crate::engine::Runnable;

    /// Source returning whatever checks it currently holds
    #[derive(Default)]
    struct StaticSource {
        checks: Mutex<Vec<Check>>,
        fail: AtomicBool,
        fetches: AtomicUsize,
    }

    impl StaticSource {
        fn with_ids(ids: &[u64]) -> Arc<Self> {
            let source = Arc::new(Self::default());
            source.set_ids(ids);
            source
        }

        fn set_ids(&self, ids: &[u64]) {
            *self.checks.lock().unwrap() = ids.iter().map(|id| Check::new(*id, "main", "pipeline", 1)).collect();
        }
    }

    #[async_trait]
    impl CheckSource for StaticSource {
        async fn started_checks(&self) -> eyre::Result<Vec<Check>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(eyre::eyre!("database unavailable"));
            }
            Ok(self.checks.lock().unwrap().clone())
        }
    }

    /// Source whose fetch never completes
    struct HangingSource;

    #[async_trait]
    impl CheckSource for HangingSource {
        async fn started_checks(&self) -> eyre::Result<Vec<Check>> {
            std::future::pending().await
        }
    }

    /// Records what runs and how much runs at once
    #[derive(Default)]
    struct Tally {
        running: AtomicUsize,
        peak: AtomicUsize,
        started: Mutex<Vec<CheckId>>,
        by_id: Mutex<HashMap<CheckId, usize>>,
        duplicate: AtomicBool,
    }

    impl Tally {
        fn enter(&self, id: CheckId) {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.started.lock().unwrap().push(id);
            let mut by_id = self.by_id.lock().unwrap();
            let count = by_id.entry(id).or_default();
            *count += 1;
            if *count > 1 {
                self.duplicate.store(true, Ordering::SeqCst);
            }
        }

        fn exit(&self, id: CheckId) {
            self.running.fetch_sub(1, Ordering::SeqCst);
            *self.by_id.lock().unwrap().entry(id).or_default() -= 1;
        }

        fn started(&self) -> Vec<CheckId> {
            self.started.lock().unwrap().clone()
        }
    }

    /// Engine whose checks run until the test hands out gate permits
    struct GatedEngine {
        gate: Arc<Semaphore>,
        tally: Arc<Tally>,
        panic_on: Option<CheckId>,
    }

    impl GatedEngine {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                gate: Arc::new(Semaphore::new(0)),
                tally: Arc::new(Tally::default()),
                panic_on: None,
            })
        }

        fn panicking_on(id: u64) -> Arc<Self> {
            Arc::new(Self {
                gate: Arc::new(Semaphore::new(0)),
                tally: Arc::new(Tally::default()),
                panic_on: Some(CheckId::new(id)),
            })
        }

        /// Let `n` running checks finish
        fn release(&self, n: usize) {
            self.gate.add_permits(n);
        }
    }

    struct GatedRun {
        id: CheckId,
        gate: Arc<Semaphore>,
        tally: Arc<Tally>,
        panic: bool,
    }

    impl Engine for GatedEngine {
        fn new_check(&self, check: Check) -> Box<dyn Runnable> {
            Box::new(GatedRun {
                id: check.id,
                gate: Arc::clone(&self.gate),
                tally: Arc::clone(&self.tally),
                panic: self.panic_on == Some(check.id),
            })
        }
    }

    #[async_trait]
    impl Runnable for GatedRun {
        async fn run(self: Box<Self>) {
            self.tally.enter(self.id);
            if self.panic {
                self.tally.exit(self.id);
                panic!("check {} exploded", self.id);
            }
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
            self.tally.exit(self.id);
        }
    }

    /// Engine that panics before producing a runnable
    struct BrokenEngine;

    impl Engine for BrokenEngine {
        fn new_check(&self, check: Check) -> Box<dyn Runnable> {
            panic!("no runnable for check {}", check.id)
        }
    }

    /// Span as seen when it was created
    #[derive(Debug, Clone)]
    struct SpanRecord {
        name: &'static str,
        fields: HashMap<String, String>,
        has_parent: bool,
    }

    /// Layer recording created spans and `follows_from` links
    #[derive(Clone, Default)]
    struct SpanCapture {
        live: Arc<Mutex<HashMap<Id, SpanRecord>>>,
        created: Arc<Mutex<Vec<SpanRecord>>>,
        links: Arc<Mutex<Vec<(SpanRecord, SpanRecord)>>>,
    }

    struct FieldMap<'a>(&'a mut HashMap<String, String>);

    impl Visit for FieldMap<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            self.0.insert(field.name().to_string(), format!("{:?}", value));
        }
    }

    impl<S> Layer<S> for SpanCapture
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
            let mut fields = HashMap::new();
            attrs.record(&mut FieldMap(&mut fields));
            let record = SpanRecord {
                name: attrs.metadata().name(),
                fields,
                has_parent: ctx.span(id).and_then(|span| span.parent()).is_some(),
            };
            self.created.lock().unwrap().push(record.clone());
            self.live.lock().unwrap().insert(id.clone(), record);
        }

        fn on_follows_from(&self, span: &Id, follows: &Id, _ctx: Context<'_, S>) {
            let live = self.live.lock().unwrap();
            if let (Some(span), Some(follows)) = (live.get(span), live.get(follows)) {
                self.links.lock().unwrap().push((span.clone(), follows.clone()));
            }
        }

        fn on_close(&self, id: Id, _ctx: Context<'_, S>) {
            self.live.lock().unwrap().remove(&id);
        }
    }

    fn ids(raw: &[u64]) -> Vec<CheckId> {
        raw.iter().copied().map(CheckId::new).collect()
    }

    async fn wait_until(what: &str, condition: impl Fn() -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {}", what);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let result = Checker::new(StaticSource::with_ids(&[]), GatedEngine::new(), 0);
        assert!(matches!(result, Err(CheckerError::InvalidCapacity(0))));
    }

    #[tokio::test]
    async fn test_launches_every_check_and_cleans_up() {
        let source = StaticSource::with_ids(&[1, 2, 3]);
        let engine = GatedEngine::new();
        let checker = Checker::new(source, engine.clone(), 4).unwrap();

        let summary = checker.run_once(&CancellationToken::new()).await.unwrap();
        assert_eq!(
            summary,
            PassSummary {
                fetched: 3,
                launched: 3,
                skipped: 0
            }
        );

        wait_until("checks to start", || engine.tally.started().len() == 3).await;
        assert_eq!(checker.in_flight_ids(), ids(&[1, 2, 3]));
        assert_eq!(checker.available_slots(), 1);

        engine.release(3);
        wait_until("checks to finish", || checker.in_flight() == 0).await;
        wait_until("slots to return", || checker.available_slots() == 4).await;

        let metrics = checker.metrics();
        assert_eq!(metrics.checks_queue_size, 3);
        assert_eq!(metrics.checks_started, 3);
        assert_eq!(metrics.checks_finished, 3);
        assert_eq!(metrics.passes, 1);
    }

    #[tokio::test]
    async fn test_skips_check_still_in_flight() {
        let source = StaticSource::with_ids(&[1]);
        let engine = GatedEngine::new();
        let checker = Checker::new(source, engine.clone(), 4).unwrap();
        let cancel = CancellationToken::new();

        checker.run_once(&cancel).await.unwrap();
        wait_until("first run to start", || engine.tally.started().len() == 1).await;

        let summary = checker.run_once(&cancel).await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.launched, 0);
        assert_eq!(checker.metrics().checks_skipped, 1);

        // Once it finishes the same id is admitted again
        engine.release(1);
        wait_until("first run to finish", || checker.in_flight() == 0).await;

        let summary = checker.run_once(&cancel).await.unwrap();
        assert_eq!(summary.launched, 1);
        wait_until("second run to start", || engine.tally.started().len() == 2).await;
        assert_eq!(engine.tally.started(), ids(&[1, 1]));
        assert!(!engine.tally.duplicate.load(Ordering::SeqCst));

        engine.release(1);
        wait_until("second run to finish", || checker.in_flight() == 0).await;
    }

    #[tokio::test]
    async fn test_exhausted_budget_blocks_the_pass() {
        let source = StaticSource::with_ids(&[1]);
        let engine = GatedEngine::new();
        let checker = Arc::new(Checker::new(source.clone(), engine.clone(), 3).unwrap());

        // Check 1 is in flight from an earlier pass
        checker.run_once(&CancellationToken::new()).await.unwrap();
        wait_until("check 1 to start", || engine.tally.started().len() == 1).await;

        source.set_ids(&[1, 2, 3, 4]);
        let pass = {
            let checker = Arc::clone(&checker);
            tokio::spawn(async move { checker.run_once(&CancellationToken::new()).await })
        };

        wait_until("checks 2 and 3 to start", || engine.tally.started().len() == 3).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Check 4 is admitted but waiting for a slot
        assert!(!pass.is_finished());
        assert!(checker.is_in_flight(CheckId::new(4)));
        assert!(!engine.tally.started().contains(&CheckId::new(4)));
        assert_eq!(checker.available_slots(), 0);

        engine.release(1);
        let summary = tokio::time::timeout(Duration::from_secs(5), pass)
            .await
            .expect("pass should unblock")
            .unwrap()
            .unwrap();
        assert_eq!(
            summary,
            PassSummary {
                fetched: 4,
                launched: 3,
                skipped: 1
            }
        );

        engine.release(3);
        wait_until("all checks to finish", || checker.in_flight() == 0).await;
        assert!(engine.tally.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_abandoned_pass_releases_pending_admission() {
        let engine = GatedEngine::new();
        let checker = Checker::new(StaticSource::with_ids(&[1, 2]), engine.clone(), 1).unwrap();

        // Check 2 is admitted, then the pass is dropped while waiting for a slot
        let result = tokio::time::timeout(Duration::from_millis(50), checker.run_once(&CancellationToken::new())).await;
        assert!(result.is_err());

        assert_eq!(checker.in_flight_ids(), ids(&[1]));

        engine.release(1);
        wait_until("check 1 to finish", || checker.in_flight() == 0).await;
        assert_eq!(checker.available_slots(), 1);
        assert_eq!(engine.tally.started(), ids(&[1]));
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_state_untouched() {
        let source = StaticSource::with_ids(&[1]);
        let engine = GatedEngine::new();
        let checker = Checker::new(source.clone(), engine.clone(), 2).unwrap();
        let cancel = CancellationToken::new();

        checker.run_once(&cancel).await.unwrap();
        wait_until("check 1 to start", || engine.tally.started().len() == 1).await;

        source.set_ids(&[2, 3]);
        source.fail.store(true, Ordering::SeqCst);

        let err = checker.run_once(&cancel).await.unwrap_err();
        assert!(matches!(err, CheckerError::Fetch(_)));
        assert!(err.to_string().contains("database unavailable"));

        assert_eq!(checker.in_flight_ids(), ids(&[1]));
        assert_eq!(checker.available_slots(), 1);
        assert_eq!(checker.metrics().fetch_failures, 1);
        assert_eq!(engine.tally.started(), ids(&[1]));

        engine.release(1);
        wait_until("check 1 to finish", || checker.in_flight() == 0).await;
    }

    #[tokio::test]
    async fn test_fetch_failure_on_idle_checker() {
        let source = StaticSource::with_ids(&[1, 2]);
        source.fail.store(true, Ordering::SeqCst);
        let checker = Checker::new(source, GatedEngine::new(), 2).unwrap();

        assert!(checker.run_once(&CancellationToken::new()).await.is_err());
        assert_eq!(checker.in_flight(), 0);
        assert_eq!(checker.available_slots(), 2);
        assert_eq!(checker.metrics().checks_started, 0);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_fetch() {
        let checker = Checker::new(Arc::new(HangingSource), GatedEngine::new(), 1).unwrap();
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                cancel.cancel();
            })
        };

        let result = tokio::time::timeout(Duration::from_secs(5), checker.run_once(&cancel))
            .await
            .expect("cancel should end the pass");
        assert!(matches!(result, Err(CheckerError::Cancelled)));
        assert_eq!(checker.in_flight(), 0);
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn test_panicking_check_releases_its_slot() {
        let source = StaticSource::with_ids(&[1]);
        let engine = GatedEngine::panicking_on(1);
        let checker = Checker::new(source.clone(), engine.clone(), 1).unwrap();
        let cancel = CancellationToken::new();

        checker.run_once(&cancel).await.unwrap();
        wait_until("panic to be recorded", || checker.metrics().checks_panicked == 1).await;
        wait_until("slot to return", || checker.available_slots() == 1).await;
        assert_eq!(checker.in_flight(), 0);
        assert_eq!(checker.metrics().checks_finished, 1);

        // The budget still works after the panic
        source.set_ids(&[2]);
        checker.run_once(&cancel).await.unwrap();
        wait_until("check 2 to start", || engine.tally.started().len() == 2).await;
        engine.release(1);
        wait_until("check 2 to finish", || checker.in_flight() == 0).await;
    }

    #[tokio::test]
    async fn test_panicking_engine_releases_its_slot() {
        let checker = Checker::new(StaticSource::with_ids(&[5, 6]), Arc::new(BrokenEngine), 1).unwrap();

        let summary = checker.run_once(&CancellationToken::new()).await.unwrap();
        assert_eq!(summary.launched, 2);

        wait_until("both panics", || checker.metrics().checks_panicked == 2).await;
        wait_until("slot to return", || checker.available_slots() == 1).await;
        assert_eq!(checker.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_drain_waits_for_in_flight_checks() {
        let engine = GatedEngine::new();
        let checker = Arc::new(Checker::new(StaticSource::with_ids(&[1, 2]), engine.clone(), 2).unwrap());

        checker.run_once(&CancellationToken::new()).await.unwrap();
        wait_until("checks to start", || engine.tally.started().len() == 2).await;

        let drain = {
            let checker = Arc::clone(&checker);
            tokio::spawn(async move { checker.drain().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!drain.is_finished());

        engine.release(2);
        tokio::time::timeout(Duration::from_secs(5), drain)
            .await
            .expect("drain should finish")
            .unwrap()
            .unwrap();

        assert_eq!(checker.in_flight(), 0);
        assert_eq!(checker.available_slots(), 2);
    }

    #[tokio::test]
    async fn test_overlapping_passes_share_registry_and_budget() {
        let source = StaticSource::with_ids(&[1, 2, 3, 4, 5, 6]);
        let engine = GatedEngine::new();
        let checker = Arc::new(Checker::new(source, engine.clone(), 2).unwrap());

        let passes: Vec<_> = (0..3)
            .map(|_| {
                let checker = Arc::clone(&checker);
                tokio::spawn(async move { checker.run_once(&CancellationToken::new()).await })
            })
            .collect();

        // Let checks trickle through the budget
        for _ in 0..40 {
            engine.release(1);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        engine.release(100);

        for pass in passes {
            tokio::time::timeout(Duration::from_secs(5), pass)
                .await
                .expect("pass should finish")
                .unwrap()
                .unwrap();
        }
        wait_until("all checks to finish", || checker.in_flight() == 0).await;

        assert!(engine.tally.peak.load(Ordering::SeqCst) <= 2);
        assert!(!engine.tally.duplicate.load(Ordering::SeqCst));
        assert_eq!(checker.available_slots(), 2);
    }

    #[tokio::test]
    async fn test_check_span_follows_from_pass() {
        let capture = SpanCapture::default();
        let _default = tracing::subscriber::set_default(tracing_subscriber::registry().with(capture.clone()));

        let source = StaticSource::with_ids(&[]);
        *source.checks.lock().unwrap() = vec![Check::new(7, "ops", "deploy", 42)];
        let engine = GatedEngine::new();
        let checker = Checker::new(source, engine.clone(), 2).unwrap();

        checker.run_once(&CancellationToken::new()).await.unwrap();
        engine.release(1);
        checker.drain().await.unwrap();

        let created = capture.created.lock().unwrap().clone();
        let pass = created.iter().find(|span| span.name == "checker.run").unwrap();
        assert!(pass.fields.contains_key("pass_id"));

        let check = created.iter().find(|span| span.name == "checker.check").unwrap();
        assert_eq!(check.fields["check_id"], "7");
        assert_eq!(check.fields["team"], "ops");
        assert_eq!(check.fields["pipeline"], "deploy");
        assert_eq!(check.fields["resource_config_scope_id"], "42");
        assert!(!check.has_parent, "check span nested under the pass");

        let links = capture.links.lock().unwrap().clone();
        assert_eq!(links.len(), 1);
        let (from, to) = &links[0];
        assert_eq!(from.name, "checker.check");
        assert_eq!(from.fields["check_id"], "7");
        assert_eq!(to.name, "checker.run");
        assert_eq!(to.fields["pass_id"], pass.fields["pass_id"]);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(boxed.as_ref()), "static message");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(boxed.as_ref()), "owned message");

        let boxed: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
