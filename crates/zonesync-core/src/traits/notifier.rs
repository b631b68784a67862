//! Notification collaborator
//!
//! Delivery failures are logged by the engine and never reach the caller of
//! a sync cycle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::SyncResultEntry;

/// How many result entries a notification carries at most
pub const MAX_NOTIFICATION_DETAILS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    SyncComplete,
    SyncFailed,
}

/// Payload sent at the end of every cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncNotification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records_processed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<SyncResultEntry>,
}

impl SyncNotification {
    /// Completed cycle; only the first [`MAX_NOTIFICATION_DETAILS`] results are kept
    pub fn complete(timestamp: DateTime<Utc>, results: &[SyncResultEntry]) -> Self {
        Self {
            kind: NotificationKind::SyncComplete,
            success: true,
            timestamp,
            records_processed: Some(results.len()),
            error: None,
            error_code: None,
            details: results.iter().take(MAX_NOTIFICATION_DETAILS).cloned().collect(),
        }
    }

    pub fn failed(timestamp: DateTime<Utc>, error: &crate::Error) -> Self {
        Self {
            kind: NotificationKind::SyncFailed,
            success: false,
            timestamp,
            records_processed: None,
            error: Some(error.to_string()),
            error_code: Some(error.classification_code().to_string()),
            details: Vec::new(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &SyncNotification) -> crate::Result<()>;
}
