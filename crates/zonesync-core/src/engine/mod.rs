//! Sync orchestrator
//!
//! The SyncEngine is responsible for:
//! - Fetching the primary and secondary zones concurrently
//! - Normalizing both sides and planning actions for the configured mode
//! - Applying actions through the retry policy, recording per-action results
//! - Keeping history, progress, notifications and metrics up to date
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐      ┌─────────────┐
//! │ ZoneSource  │      │ ZoneTarget  │
//! └─────────────┘      └─────────────┘
//!        │  fetch_all (joined)  │   ▲
//!        └──────────┬───────────┘   │ add / update / delete
//!                   ▼               │
//!            ┌──────────────┐       │
//!            │  SyncEngine  │───────┘
//!            └──────────────┘
//!                   │
//!     ┌─────────────┼──────────────┐
//!     ▼             ▼              ▼
//! ┌──────────┐ ┌──────────┐ ┌─────────────┐
//! │ Progress │ │ Notifier │ │ MetricsSink │
//! └──────────┘ └──────────┘ └─────────────┘
//! ```
//!
//! ## Cycle states
//!
//! `Idle -> Running -> Idle`. A cycle requested while another one is running
//! returns [`CycleOutcome::AlreadyRunning`] without touching either provider.
//! The running flag is released by a drop guard, so errors and panics
//! unwinding through the cycle leave the engine idle.

pub mod history;
pub mod report;

pub use history::{HISTORY_CAPACITY, SyncHistory, SyncHistoryEntry};
pub use report::{ActionStatus, SyncReport, SyncResultEntry};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cache::{CachedTarget, MemoryRecordCache};
use crate::config::{ApplyMode, SyncConfig};
use crate::error::{Error, Result};
use crate::normalize::Normalizer;
use crate::plan::{self, ConflictStrategy, SyncAction, SyncMode, SyncModeConfig};
use crate::progress::{ProgressReporter, ProgressStatus, ProgressUpdate, SyncProgress};
use crate::retry::RetryPolicy;
use crate::traits::{Metric, MetricsSink, Notifier, SyncNotification, ZoneSource, ZoneTarget};

/// Progress reported once planning is done
const PLANNED_PERCENT: u8 = 30;

/// Highest percentage reported while actions are still being applied
const APPLYING_MAX_PERCENT: u8 = 99;

/// Result of asking the engine to run
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// The cycle ran to the end; individual actions may still have failed
    Completed(SyncReport),
    /// Another cycle holds the engine
    AlreadyRunning,
    /// The last successful cycle is more recent than the requested interval
    NotDue { next_due: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Idle,
    Running,
}

/// Point-in-time view of the engine
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub last_sync: Option<DateTime<Utc>>,
    pub in_progress: bool,
    pub next_scheduled_sync: Option<DateTime<Utc>>,
    pub history: Vec<SyncHistoryEntry>,
    pub mode: SyncMode,
    pub conflict_strategy: ConflictStrategy,
    pub sync_interval_secs: u64,
    pub progress: SyncProgress,
}

#[derive(Debug, Clone, Copy)]
struct LastSuccess {
    at: DateTime<Utc>,
    instant: Instant,
}

#[derive(Debug)]
struct CycleTracker {
    state: CycleState,
    last_success: Option<LastSuccess>,
    history: SyncHistory,
}

/// Releases the running flag however the cycle ends
struct CycleGuard<'a> {
    tracker: &'a Mutex<CycleTracker>,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        lock(self.tracker).state = CycleState::Idle;
    }
}

fn lock(tracker: &Mutex<CycleTracker>) -> MutexGuard<'_, CycleTracker> {
    tracker.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Core sync engine
///
/// One instance owns the running flag, the last-success time and the
/// history ring. Overlapping cycles across separate instances are not
/// prevented.
pub struct SyncEngine {
    source: Box<dyn ZoneSource>,
    target: Box<dyn ZoneTarget>,
    normalizer: Normalizer,
    notifier: Option<Arc<dyn Notifier>>,
    metrics: Option<Arc<dyn MetricsSink>>,
    progress: Arc<ProgressReporter>,
    retry: RetryPolicy,
    sync: SyncModeConfig,
    apply_mode: ApplyMode,
    interval: Duration,
    tracker: Mutex<CycleTracker>,
}

impl SyncEngine {
    /// Create a new engine
    ///
    /// The configuration is validated first. When `engine.cache_enabled` is
    /// set, the secondary listing is read through an in-memory cache.
    pub fn new(source: Box<dyn ZoneSource>, target: Box<dyn ZoneTarget>, config: &SyncConfig) -> Result<Self> {
        config.validate()?;

        let target: Box<dyn ZoneTarget> = if config.engine.cache_enabled {
            debug!("Reading {} records through the in-memory cache", target.provider_name());
            Box::new(CachedTarget::new(target, Arc::new(MemoryRecordCache::new())))
        } else {
            target
        };
        let normalizer = Normalizer::new(target.zone_name());

        Ok(Self {
            source,
            target,
            normalizer,
            notifier: None,
            metrics: None,
            progress: Arc::new(ProgressReporter::new()),
            retry: config.engine.retry_policy(),
            sync: config.sync,
            apply_mode: config.engine.apply,
            interval: config.engine.sync_interval(),
            tracker: Mutex::new(CycleTracker {
                state: CycleState::Idle,
                last_success: None,
                history: SyncHistory::default(),
            }),
        })
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Shared progress channel
    pub fn progress(&self) -> Arc<ProgressReporter> {
        self.progress.clone()
    }

    /// History snapshot, most recent first
    pub fn history(&self) -> Vec<SyncHistoryEntry> {
        lock(&self.tracker).history.entries()
    }

    pub fn state(&self) -> CycleState {
        lock(&self.tracker).state
    }

    /// Configured interval between successful cycles
    pub fn sync_interval(&self) -> Duration {
        self.interval
    }

    pub fn status(&self) -> SyncStatus {
        let tracker = lock(&self.tracker);
        let last_sync = tracker.last_success.map(|s| s.at);
        SyncStatus {
            last_sync,
            in_progress: tracker.state == CycleState::Running,
            next_scheduled_sync: last_sync.and_then(|at| wall_clock_after(at, self.interval)),
            history: tracker.history.entries(),
            mode: self.sync.mode,
            conflict_strategy: self.sync.conflict_strategy,
            sync_interval_secs: self.interval.as_secs(),
            progress: self.progress.current(),
        }
    }

    /// Run one cycle now, unless one is already running.
    ///
    /// Fetch and plan errors abort the cycle and are returned. Failed actions
    /// are recorded in the report instead.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        match self.begin(None) {
            Ok(_guard) => self.execute().await,
            Err(outcome) => Ok(outcome),
        }
    }

    /// Run a cycle only if the last successful one finished at least
    /// `interval` ago. Failed cycles do not count.
    pub async fn run_if_due(&self, interval: Duration) -> Result<CycleOutcome> {
        match self.begin(Some(interval)) {
            Ok(_guard) => self.execute().await,
            Err(outcome) => Ok(outcome),
        }
    }

    /// Claim the engine, or explain why no cycle should start
    fn begin(&self, interval: Option<Duration>) -> std::result::Result<CycleGuard<'_>, CycleOutcome> {
        let mut tracker = lock(&self.tracker);
        if tracker.state == CycleState::Running {
            info!("Sync already in progress, skipping");
            return Err(CycleOutcome::AlreadyRunning);
        }

        if let Some(interval) = interval
            && let Some(last) = tracker.last_success
            && last.instant.elapsed() < interval
        {
            let remaining = interval.saturating_sub(last.instant.elapsed());
            let next_due = wall_clock_after(Utc::now(), remaining).unwrap_or(last.at);
            debug!("Next sync due at {}", next_due);
            return Err(CycleOutcome::NotDue { next_due });
        }

        tracker.state = CycleState::Running;
        Ok(CycleGuard { tracker: &self.tracker })
    }

    async fn execute(&self) -> Result<CycleOutcome> {
        let started = Instant::now();
        let timestamp = Utc::now();
        info!("Starting {} sync", self.sync.mode);
        self.progress.reset();

        match self.sync_once(timestamp).await {
            Ok(report) => {
                info!(
                    "Sync completed: {} action(s), {} succeeded, {} failed",
                    report.records_processed(),
                    report.succeeded(),
                    report.failed()
                );
                {
                    let mut tracker = lock(&self.tracker);
                    tracker.history.push(SyncHistoryEntry::completed(&report));
                    tracker.last_success = Some(LastSuccess {
                        at: Utc::now(),
                        instant: Instant::now(),
                    });
                }

                self.notify(SyncNotification::complete(timestamp, &report.results)).await;
                self.emit_metrics(started.elapsed(), report.records_processed(), Some(report.source_count), None)
                    .await;
                self.progress.complete(format!(
                    "Sync completed: {} action(s) applied",
                    report.records_processed()
                ));
                Ok(CycleOutcome::Completed(report))
            }
            Err(e) => {
                error!("Sync failed: {}", e);
                lock(&self.tracker).history.push(SyncHistoryEntry::failed(timestamp, &e));

                self.notify(SyncNotification::failed(timestamp, &e)).await;
                self.emit_metrics(started.elapsed(), 0, None, Some(&e)).await;
                self.progress.fail(e.to_string());
                Err(e)
            }
        }
    }

    async fn sync_once(&self, timestamp: DateTime<Utc>) -> Result<SyncReport> {
        self.progress.publish(ProgressUpdate::stage(
            ProgressStatus::Fetching,
            10,
            "Fetching records",
        ));
        let (source_raw, target_raw) = tokio::try_join!(self.source.fetch_all(), self.target.fetch_all())?;
        debug!(
            "Fetched {} record(s) from {} and {} from {}",
            source_raw.len(),
            self.source.provider_name(),
            target_raw.len(),
            self.target.provider_name()
        );

        let source = self.normalizer.normalize_sources(&source_raw)?;
        let target = self.normalizer.normalize_targets(&target_raw)?;
        let actions = plan::plan_listing(&source, &target, &self.sync)?;
        self.progress.publish(ProgressUpdate::stage(
            ProgressStatus::Planning,
            PLANNED_PERCENT,
            format!("Planned {} action(s)", actions.len()),
        ));

        self.progress.publish(ProgressUpdate::stage(
            ProgressStatus::Applying,
            PLANNED_PERCENT,
            "Applying changes",
        ));
        let results = self.apply(&actions).await;

        Ok(SyncReport {
            timestamp,
            mode: self.sync.mode,
            source_count: source.len(),
            target_count: target.len(),
            results,
        })
    }

    /// Apply every action; results keep plan order
    async fn apply(&self, actions: &[SyncAction]) -> Vec<SyncResultEntry> {
        let total = actions.len();
        let mut results = Vec::with_capacity(total);

        match self.apply_mode {
            ApplyMode::Sequential => {
                for action in actions {
                    results.push(self.apply_one(action).await);
                    self.report_applied(results.len(), total);
                }
            }
            ApplyMode::Batched { width } => {
                // Only same-kind neighbours may overlap, so every delete
                // of a full sync lands before the first add starts
                for run in actions.chunk_by(|a, b| a.kind() == b.kind()) {
                    for batch in run.chunks(width.max(1)) {
                        let applied = futures::future::join_all(batch.iter().map(|a| self.apply_one(a))).await;
                        results.extend(applied);
                        self.report_applied(results.len(), total);
                    }
                }
            }
        }
        results
    }

    async fn apply_one(&self, action: &SyncAction) -> SyncResultEntry {
        match self.retry.run(move || self.execute_action(action)).await {
            Ok(()) => {
                debug!("Applied {} {}", action.kind(), action.identity());
                SyncResultEntry::success(action)
            }
            Err(e) => {
                error!("Failed to {} {}: {}", action.kind(), action.identity(), e);
                SyncResultEntry::failed(action, &e)
            }
        }
    }

    async fn execute_action(&self, action: &SyncAction) -> Result<()> {
        match action {
            SyncAction::Add { record } => {
                let reference = self.target.add(record).await?;
                if reference.is_assigned() {
                    debug!("Created {} as {}", record.identity(), reference.id);
                }
                Ok(())
            }
            SyncAction::Update { record, target } => self.target.update(target, record).await,
            SyncAction::Delete { target, .. } => self.target.delete(target).await,
            SyncAction::DeleteUnsupported(entry) => self.target.delete(&entry.reference).await,
        }
    }

    fn report_applied(&self, done: usize, total: usize) {
        let span = usize::from(APPLYING_MAX_PERCENT - PLANNED_PERCENT);
        let percentage = PLANNED_PERCENT + (done * span / total.max(1)) as u8;
        self.progress.publish(ProgressUpdate::percent(
            percentage,
            format!("Applied {done}/{total} action(s)"),
        ));
    }

    async fn notify(&self, notification: SyncNotification) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        if let Err(e) = notifier.notify(&notification).await {
            warn!("Failed to deliver sync notification: {}", e);
        }
    }

    async fn emit_metrics(
        &self,
        elapsed: Duration,
        records_processed: usize,
        record_count: Option<usize>,
        error: Option<&Error>,
    ) {
        let Some(sink) = &self.metrics else {
            return;
        };

        let success = error.is_none();
        let tag = |metric: Metric| {
            let metric = metric.with_tag("mode", self.sync.mode).with_tag("success", success);
            let metric = match record_count {
                Some(count) => metric.with_tag("record_count", count),
                None => metric,
            };
            match error {
                Some(e) => metric.with_tag("error_code", e.classification_code()),
                None => metric,
            }
        };

        let metrics = [
            tag(Metric::new("sync_duration_ms", elapsed.as_millis() as f64)),
            tag(Metric::new("sync_success", if success { 1.0 } else { 0.0 })),
            tag(Metric::new("sync_records_processed", records_processed as f64)),
        ];
        for metric in metrics {
            let name = metric.name.clone();
            if let Err(e) = sink.record(metric).await {
                warn!("Failed to record metric {}: {}", name, e);
            }
        }
    }
}

fn wall_clock_after(at: DateTime<Utc>, interval: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(interval)
        .ok()
        .and_then(|d| at.checked_add_signed(d))
}
