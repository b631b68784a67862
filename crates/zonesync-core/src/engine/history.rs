//! Bounded, most-recent-first sync history

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

use super::report::{SyncReport, SyncResultEntry};
use crate::error::Error;

/// Entries kept in memory
pub const HISTORY_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncHistoryEntry {
    pub timestamp: DateTime<Utc>,
    /// The cycle completed without a fetch or plan error. Individual action
    /// failures do not make this false.
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records_processed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<SyncResultEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncHistoryEntry {
    pub fn completed(report: &SyncReport) -> Self {
        Self {
            timestamp: report.timestamp,
            success: true,
            records_processed: Some(report.records_processed()),
            details: Some(report.results.clone()),
            error: None,
        }
    }

    pub fn failed(timestamp: DateTime<Utc>, error: &Error) -> Self {
        Self {
            timestamp,
            success: false,
            records_processed: None,
            details: None,
            error: Some(error.to_string()),
        }
    }
}

/// Fixed-capacity ring; the newest entry is always first
#[derive(Debug, Clone)]
pub struct SyncHistory {
    entries: VecDeque<SyncHistoryEntry>,
    capacity: usize,
}

impl Default for SyncHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl SyncHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn push(&mut self, entry: SyncHistoryEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    pub fn latest(&self) -> Option<&SyncHistoryEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot, most recent first
    pub fn entries(&self) -> Vec<SyncHistoryEntry> {
        self.entries.iter().cloned().collect()
    }
}
