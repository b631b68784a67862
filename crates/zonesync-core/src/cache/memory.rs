// # Memory Record Cache
//
// In-memory implementation of RecordCache.
//
// ## Crash Behavior
//
// - Everything is lost on restart; the first cycle after a restart always
//   performs a live fetch
//
// ## Expiry
//
// Entries past the hard expiry are dropped lazily on read.

use async_trait::async_trait;
use chrono::Duration;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::hard_expiry;
use crate::Error;
use crate::traits::record_cache::{CachedRecords, RecordCache};

/// In-memory record cache
///
/// Listings are stored per zone in a HashMap protected by a RwLock. Clones
/// share the same storage.
#[derive(Debug, Clone)]
pub struct MemoryRecordCache {
    inner: Arc<RwLock<HashMap<String, CachedRecords>>>,
    expiry: Duration,
}

impl MemoryRecordCache {
    /// Create an empty cache with the default hard expiry
    pub fn new() -> Self {
        Self::with_expiry(hard_expiry())
    }

    pub fn with_expiry(expiry: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            expiry,
        }
    }

    /// Number of cached zones
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    fn key(zone: &str) -> String {
        zone.trim_end_matches('.').to_ascii_lowercase()
    }
}

impl Default for MemoryRecordCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordCache for MemoryRecordCache {
    async fn get(&self, zone: &str) -> Result<Option<CachedRecords>, Error> {
        let key = Self::key(zone);
        {
            let guard = self.inner.read().await;
            match guard.get(&key) {
                None => return Ok(None),
                Some(entry) if entry.is_fresh(self.expiry) => return Ok(Some(entry.clone())),
                Some(_) => {}
            }
        }

        debug!("Cached listing for {} expired, dropping it", key);
        self.inner.write().await.remove(&key);
        Ok(None)
    }

    async fn put(&self, zone: &str, entry: CachedRecords) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert(Self::key(zone), entry);
        Ok(())
    }

    async fn invalidate(&self, zone: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.remove(&Self::key(zone));
        Ok(())
    }
}
