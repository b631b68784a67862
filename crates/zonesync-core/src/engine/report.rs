//! Per-cycle results

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Error;
use crate::plan::{ActionKind, SyncAction, SyncMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Success,
    Failed,
}

/// Outcome of one applied action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResultEntry {
    pub action: ActionKind,
    pub record_name: String,
    pub record_type: String,
    pub status: ActionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncResultEntry {
    pub fn success(action: &SyncAction) -> Self {
        Self::new(action, ActionStatus::Success, None)
    }

    pub fn failed(action: &SyncAction, error: &Error) -> Self {
        Self::new(action, ActionStatus::Failed, Some(error.to_string()))
    }

    fn new(action: &SyncAction, status: ActionStatus, error: Option<String>) -> Self {
        Self {
            action: action.kind(),
            record_name: action.name().to_string(),
            record_type: action.type_label().to_string(),
            status,
            error,
        }
    }

    /// `"<TYPE> <name>"`
    pub fn record_identity(&self) -> String {
        format!("{} {}", self.record_type, self.record_name)
    }

    pub fn is_success(&self) -> bool {
        self.status == ActionStatus::Success
    }
}

/// Everything a completed cycle did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub timestamp: DateTime<Utc>,
    pub mode: SyncMode,
    pub source_count: usize,
    pub target_count: usize,
    pub results: Vec<SyncResultEntry>,
}

impl SyncReport {
    pub fn records_processed(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.records_processed() - self.succeeded()
    }
}
