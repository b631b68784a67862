// # Record Cache Trait
//
// Optional read-through cache for the secondary zone listing, keyed by zone
// name.
//
// ## Semantics
//
// - Entries older than the freshness window are ignored by readers but may
//   still be returned by `get`; freshness is the caller's decision
// - Entries older than the hard expiry are never returned
// - A cache error never fails a fetch: the caller falls back to a live read
//
// ## Implementations
//
// - [`crate::cache::MemoryRecordCache`]: in-process, not persistent

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::record::TargetRecord;

/// Listing stored with the time it was fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedRecords {
    pub stored_at: DateTime<Utc>,
    pub records: Vec<TargetRecord>,
}

impl CachedRecords {
    pub fn new(records: Vec<TargetRecord>) -> Self {
        Self {
            stored_at: Utc::now(),
            records,
        }
    }

    /// Age of the entry
    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.stored_at)
    }

    /// Whether the entry is younger than `max_age`
    pub fn is_fresh(&self, max_age: Duration) -> bool {
        self.age() < max_age
    }
}

/// Trait for record cache implementations
///
/// All methods must be safe to call concurrently from multiple tasks.
#[async_trait]
pub trait RecordCache: Send + Sync {
    /// Cached listing for `zone`, if any and not hard-expired
    async fn get(&self, zone: &str) -> crate::Result<Option<CachedRecords>>;

    /// Store a listing for `zone`
    async fn put(&self, zone: &str, entry: CachedRecords) -> crate::Result<()>;

    /// Drop the listing for `zone`
    async fn invalidate(&self, zone: &str) -> crate::Result<()>;
}
