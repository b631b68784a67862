// # zonesync-core
//
// Core library for keeping a secondary DNS zone in step with a primary one.
//
// ## Architecture Overview
//
// - **ZoneSource**: Trait for listing the primary (authoritative) zone
// - **ZoneTarget**: Trait for listing and mutating the secondary zone
// - **Normalizer**: Maps both providers' shapes onto one canonical record
// - **plan**: Computes the ordered add/update/delete actions for a sync mode
// - **RetryPolicy**: Bounded exponential backoff for transient failures
// - **SyncEngine**: Orchestrates fetch, plan and apply for one cycle at a time
// - **ProgressReporter**: Snapshot-then-updates progress channel
//
// Notifications, metrics and the record cache are optional collaborators.
// Their failures are logged and never fail a cycle.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod normalize;
pub mod plan;
pub mod progress;
pub mod record;
pub mod retry;
pub mod traits;

// Re-export core types for convenience
pub use cache::{CachedTarget, MemoryRecordCache};
pub use config::{ApplyMode, ClouDnsAuth, EngineConfig, NotificationConfig, SourceConfig, SyncConfig, TargetConfig};
pub use engine::{CycleOutcome, CycleState, SyncEngine, SyncHistoryEntry, SyncReport, SyncResultEntry, SyncStatus};
pub use error::{Error, ProviderDetails, Result};
pub use normalize::Normalizer;
pub use plan::{ActionKind, ConflictStrategy, SyncAction, SyncMode, SyncModeConfig};
pub use progress::{ProgressReporter, ProgressStatus, ProgressUpdate, SyncProgress};
pub use record::{CanonicalRecord, ProviderRef, RecordType, SourceRecord, TargetEntry, TargetRecord, TypeFields};
pub use retry::RetryPolicy;
pub use traits::{Metric, MetricsSink, Notifier, RecordCache, SyncNotification, ZoneSource, ZoneTarget};
