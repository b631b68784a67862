// # Progress Reporter
//
// Publish/subscribe channel for the state of the running sync cycle.
//
// - A new subscriber immediately receives the current snapshot.
// - Every published update is merged into the snapshot and broadcast to all
//   subscribers in registration order.
// - `Completed` and `Failed` are terminal: percentage is forced to 100, every
//   subscriber stream ends, and further updates are ignored until the
//   orchestrator resets the reporter at the next cycle start.
// - Subscribing while the snapshot is terminal yields that snapshot and an
//   immediately finished stream.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    /// No cycle has started yet
    Idle,
    Initializing,
    Fetching,
    Planning,
    Applying,
    Completed,
    Failed,
}

impl ProgressStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressStatus::Completed | ProgressStatus::Failed)
    }
}

/// Snapshot broadcast to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncProgress {
    pub status: ProgressStatus,
    pub percentage: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SyncProgress {
    fn idle() -> Self {
        Self {
            status: ProgressStatus::Idle,
            percentage: 0,
            message: "Waiting for first sync".to_string(),
            error: None,
            updated_at: Utc::now(),
        }
    }

    fn merge(&mut self, update: ProgressUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(percentage) = update.percentage {
            self.percentage = percentage.min(100);
        }
        if let Some(message) = update.message {
            self.message = message;
        }
        if update.error.is_some() {
            self.error = update.error;
        }
        if self.status.is_terminal() {
            self.percentage = 100;
        }
        self.updated_at = Utc::now();
    }
}

/// Partial update; unset fields keep their current value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub status: Option<ProgressStatus>,
    pub percentage: Option<u8>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl ProgressUpdate {
    /// Move to a new stage
    pub fn stage(status: ProgressStatus, percentage: u8, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            percentage: Some(percentage),
            message: Some(message.into()),
            error: None,
        }
    }

    /// Advance within the current stage
    pub fn percent(percentage: u8, message: impl Into<String>) -> Self {
        Self {
            percentage: Some(percentage),
            message: Some(message.into()),
            ..Default::default()
        }
    }
}

struct Inner {
    current: SyncProgress,
    subscribers: Vec<mpsc::UnboundedSender<SyncProgress>>,
}

pub struct ProgressReporter {
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ProgressReporter")
            .field("current", &inner.current)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                current: SyncProgress::idle(),
                subscribers: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current snapshot
    pub fn current(&self) -> SyncProgress {
        self.lock().current.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Register a listener; the current snapshot is delivered first.
    pub fn subscribe(&self) -> UnboundedReceiverStream<SyncProgress> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        // Receiver is alive, so this cannot fail
        let _ = tx.send(inner.current.clone());
        if !inner.current.status.is_terminal() {
            inner.subscribers.push(tx);
        }
        UnboundedReceiverStream::new(rx)
    }

    /// Merge `update` and broadcast the result.
    ///
    /// Returns `false` when the update was dropped because the snapshot is
    /// already terminal.
    pub fn publish(&self, update: ProgressUpdate) -> bool {
        let mut inner = self.lock();
        if inner.current.status.is_terminal() {
            debug!("Ignoring progress update after {:?}", inner.current.status);
            return false;
        }

        inner.current.merge(update);
        let snapshot = inner.current.clone();
        inner.subscribers.retain(|tx| tx.send(snapshot.clone()).is_ok());
        if snapshot.status.is_terminal() {
            // Dropping the senders ends every subscriber stream
            inner.subscribers.clear();
        }
        true
    }

    /// Terminal success
    pub fn complete(&self, message: impl Into<String>) -> bool {
        self.publish(ProgressUpdate::stage(ProgressStatus::Completed, 100, message))
    }

    /// Terminal failure carrying `error`
    pub fn fail(&self, error: impl Into<String>) -> bool {
        let error = error.into();
        self.publish(ProgressUpdate {
            status: Some(ProgressStatus::Failed),
            percentage: Some(100),
            message: Some(format!("Sync failed: {error}")),
            error: Some(error),
        })
    }

    /// Start a new cycle: back to `Initializing` with no error.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.current = SyncProgress {
            status: ProgressStatus::Initializing,
            percentage: 0,
            message: "Starting sync".to_string(),
            error: None,
            updated_at: Utc::now(),
        };
        let snapshot = inner.current.clone();
        inner.subscribers.retain(|tx| tx.send(snapshot.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn subscriber_gets_snapshot_then_updates_until_terminal() {
        let reporter = ProgressReporter::new();
        reporter.reset();
        let mut stream = reporter.subscribe();

        reporter.publish(ProgressUpdate::stage(ProgressStatus::Fetching, 10, "Fetching records"));
        reporter.publish(ProgressUpdate::percent(20, "Still fetching"));
        reporter.complete("Done");

        let seen: Vec<SyncProgress> = (&mut stream).collect().await;
        let statuses: Vec<_> = seen.iter().map(|p| (p.status, p.percentage)).collect();
        assert_eq!(
            statuses,
            vec![
                (ProgressStatus::Initializing, 0),
                (ProgressStatus::Fetching, 10),
                (ProgressStatus::Fetching, 20),
                (ProgressStatus::Completed, 100),
            ]
        );
        assert_eq!(seen[2].message, "Still fetching");
        assert_eq!(reporter.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn every_subscriber_sees_updates_in_publish_order() {
        let reporter = ProgressReporter::new();
        reporter.reset();
        let first = reporter.subscribe();
        reporter.publish(ProgressUpdate::stage(ProgressStatus::Fetching, 10, "Fetching records"));
        let second = reporter.subscribe();

        reporter.publish(ProgressUpdate::stage(ProgressStatus::Planning, 30, "Planning"));
        reporter.publish(ProgressUpdate::stage(ProgressStatus::Applying, 45, "Applying"));
        reporter.publish(ProgressUpdate::percent(70, "Applied 3/4"));
        reporter.complete("Done");

        let first: Vec<(ProgressStatus, u8)> = first.map(|p| (p.status, p.percentage)).collect().await;
        let second: Vec<(ProgressStatus, u8)> = second.map(|p| (p.status, p.percentage)).collect().await;
        assert_eq!(
            first,
            vec![
                (ProgressStatus::Initializing, 0),
                (ProgressStatus::Fetching, 10),
                (ProgressStatus::Planning, 30),
                (ProgressStatus::Applying, 45),
                (ProgressStatus::Applying, 70),
                (ProgressStatus::Completed, 100),
            ]
        );
        // The later subscriber starts from the snapshot current at registration
        assert_eq!(second, first[1..]);
    }

    #[tokio::test]
    async fn failure_forces_full_percentage_and_carries_error() {
        let reporter = ProgressReporter::new();
        reporter.reset();
        reporter.publish(ProgressUpdate::stage(ProgressStatus::Applying, 45, "Applying"));
        let mut stream = reporter.subscribe();
        reporter.fail("boom");

        let seen: Vec<SyncProgress> = (&mut stream).collect().await;
        let last = seen.last().unwrap();
        assert_eq!(last.status, ProgressStatus::Failed);
        assert_eq!(last.percentage, 100);
        assert_eq!(last.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn late_subscriber_sees_terminal_snapshot_and_ends() {
        let reporter = ProgressReporter::new();
        reporter.reset();
        reporter.complete("Done");

        let seen: Vec<SyncProgress> = reporter.subscribe().collect().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].status, ProgressStatus::Completed);
    }

    #[test]
    fn updates_after_terminal_are_ignored_until_reset() {
        let reporter = ProgressReporter::new();
        reporter.reset();
        assert!(reporter.fail("boom"));
        assert!(!reporter.publish(ProgressUpdate::percent(50, "late")));
        assert_eq!(reporter.current().status, ProgressStatus::Failed);

        reporter.reset();
        assert_eq!(reporter.current().status, ProgressStatus::Initializing);
        assert_eq!(reporter.current().error, None);
        assert!(reporter.publish(ProgressUpdate::percent(50, "again")));
    }

    #[tokio::test]
    async fn dropped_subscribers_are_pruned() {
        let reporter = ProgressReporter::new();
        let mut first = reporter.subscribe();
        let second = reporter.subscribe();
        assert_eq!(reporter.subscriber_count(), 2);

        drop(second);
        reporter.reset();
        assert_eq!(reporter.subscriber_count(), 1);

        assert_eq!(first.next().await.unwrap().status, ProgressStatus::Idle);
        assert_eq!(first.next().await.unwrap().status, ProgressStatus::Initializing);
    }
}
