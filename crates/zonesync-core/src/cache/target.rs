//! Read-through caching decorator for a [`ZoneTarget`]

use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, warn};

use super::freshness_window;
use crate::error::Result;
use crate::record::{CanonicalRecord, ProviderRef, TargetRecord};
use crate::traits::{CachedRecords, RecordCache, ZoneTarget};

/// Serves fresh secondary listings from a [`RecordCache`].
///
/// Cache failures are logged and fall back to the wrapped target; they never
/// fail a fetch. Every successful mutation invalidates the zone's entry so the
/// next cycle sees the provider's state.
pub struct CachedTarget {
    inner: Box<dyn ZoneTarget>,
    cache: Arc<dyn RecordCache>,
    freshness: Duration,
}

impl CachedTarget {
    pub fn new(inner: Box<dyn ZoneTarget>, cache: Arc<dyn RecordCache>) -> Self {
        Self {
            inner,
            cache,
            freshness: freshness_window(),
        }
    }

    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    async fn invalidate(&self) {
        let zone = self.inner.zone_name();
        if let Err(e) = self.cache.invalidate(zone).await {
            warn!("Failed to invalidate cached records for {}: {}", zone, e);
        }
    }
}

#[async_trait]
impl ZoneTarget for CachedTarget {
    async fn fetch_all(&self) -> Result<Vec<TargetRecord>> {
        let zone = self.inner.zone_name();
        match self.cache.get(zone).await {
            Ok(Some(entry)) if entry.is_fresh(self.freshness) => {
                debug!(
                    "Serving {} cached record(s) for {} ({}s old)",
                    entry.records.len(),
                    zone,
                    entry.age().num_seconds()
                );
                return Ok(entry.records);
            }
            Ok(_) => {}
            Err(e) => warn!("Record cache read failed for {}, fetching live: {}", zone, e),
        }

        let records = self.inner.fetch_all().await?;
        if let Err(e) = self.cache.put(zone, CachedRecords::new(records.clone())).await {
            warn!("Failed to cache records for {}: {}", zone, e);
        }
        Ok(records)
    }

    async fn add(&self, record: &CanonicalRecord) -> Result<ProviderRef> {
        let reference = self.inner.add(record).await?;
        self.invalidate().await;
        Ok(reference)
    }

    async fn update(&self, target: &ProviderRef, record: &CanonicalRecord) -> Result<()> {
        self.inner.update(target, record).await?;
        self.invalidate().await;
        Ok(())
    }

    async fn delete(&self, target: &ProviderRef) -> Result<()> {
        self.inner.delete(target).await?;
        self.invalidate().await;
        Ok(())
    }

    fn zone_name(&self) -> &str {
        self.inner.zone_name()
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::cache::MemoryRecordCache;
    use crate::record::{RecordType, TypeFields};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTarget {
        fetches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ZoneTarget for CountingTarget {
        async fn fetch_all(&self) -> Result<Vec<TargetRecord>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(vec![TargetRecord {
                id: "1".into(),
                record_type: "A".into(),
                host: "@".into(),
                record: "192.0.2.1".into(),
                ttl: 300,
                ..Default::default()
            }])
        }

        async fn add(&self, _record: &CanonicalRecord) -> Result<ProviderRef> {
            Ok(ProviderRef::new("2"))
        }

        async fn update(&self, _target: &ProviderRef, _record: &CanonicalRecord) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _target: &ProviderRef) -> Result<()> {
            Err(Error::from_status("counting", 404, "gone"))
        }

        fn zone_name(&self) -> &str {
            "example.com"
        }

        fn provider_name(&self) -> &'static str {
            "counting"
        }
    }

    struct BrokenCache;

    #[async_trait]
    impl RecordCache for BrokenCache {
        async fn get(&self, _zone: &str) -> Result<Option<CachedRecords>> {
            Err(Error::cache("backend unavailable"))
        }

        async fn put(&self, _zone: &str, _entry: CachedRecords) -> Result<()> {
            Err(Error::cache("backend unavailable"))
        }

        async fn invalidate(&self, _zone: &str) -> Result<()> {
            Err(Error::cache("backend unavailable"))
        }
    }

    fn counting() -> (Box<dyn ZoneTarget>, Arc<AtomicUsize>) {
        let fetches = Arc::new(AtomicUsize::new(0));
        (
            Box::new(CountingTarget {
                fetches: fetches.clone(),
            }),
            fetches,
        )
    }

    fn a_record() -> CanonicalRecord {
        CanonicalRecord::new(RecordType::A, "example.com", "192.0.2.2", 300, TypeFields::None).unwrap()
    }

    #[tokio::test]
    async fn fresh_listing_is_served_from_cache() {
        let (inner, fetches) = counting();
        let target = CachedTarget::new(inner, Arc::new(MemoryRecordCache::new()));

        assert_eq!(target.fetch_all().await.unwrap().len(), 1);
        assert_eq!(target.fetch_all().await.unwrap().len(), 1);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_listing_is_refetched() {
        let (inner, fetches) = counting();
        let cache = Arc::new(MemoryRecordCache::new());
        let mut stale = CachedRecords::new(Vec::new());
        stale.stored_at = Utc::now() - Duration::minutes(6);
        cache.put("example.com", stale).await.unwrap();

        let target = CachedTarget::new(inner, cache);
        assert_eq!(target.fetch_all().await.unwrap().len(), 1);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mutations_invalidate() {
        let (inner, fetches) = counting();
        let target = CachedTarget::new(inner, Arc::new(MemoryRecordCache::new()));

        target.fetch_all().await.unwrap();
        target.add(&a_record()).await.unwrap();
        target.fetch_all().await.unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_mutation_keeps_entry() {
        let (inner, fetches) = counting();
        let target = CachedTarget::new(inner, Arc::new(MemoryRecordCache::new()));

        target.fetch_all().await.unwrap();
        assert!(target.delete(&ProviderRef::new("1")).await.is_err());
        target.fetch_all().await.unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_errors_fall_back_to_live_fetch() {
        let (inner, fetches) = counting();
        let target = CachedTarget::new(inner, Arc::new(BrokenCache));

        assert_eq!(target.fetch_all().await.unwrap().len(), 1);
        assert_eq!(target.fetch_all().await.unwrap().len(), 1);
        target.update(&ProviderRef::new("1"), &a_record()).await.unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }
}
