// # Zone Target Trait
//
// The secondary side of the sync: the only place records are mutated.
//
// ## Implementations
//
// - ClouDNS: `zonesync-provider-cloudns` crate
// - [`crate::cache::CachedTarget`]: read-through cache decorator

use async_trait::async_trait;

use crate::record::{CanonicalRecord, ProviderRef, TargetRecord};

/// Read/write access to the secondary zone
///
/// # Contract
///
/// - Every method performs one provider request; retry and backoff are owned
///   by the engine's retry executor
/// - HTTP 5xx, 429 and transport failures must surface as transient errors so
///   the executor retries them; anything else as permanent
/// - `add`, `update` and `delete` receive canonical records and translate them
///   into the provider's own shape (relative hosts, flat columns)
#[async_trait]
pub trait ZoneTarget: Send + Sync {
    /// Every record of the zone, in provider order
    async fn fetch_all(&self) -> crate::Result<Vec<TargetRecord>>;

    /// Create `record`, returning the handle of the new record
    async fn add(&self, record: &CanonicalRecord) -> crate::Result<ProviderRef>;

    /// Overwrite the record behind `target` with `record`
    async fn update(&self, target: &ProviderRef, record: &CanonicalRecord) -> crate::Result<()>;

    /// Remove the record behind `target`
    async fn delete(&self, target: &ProviderRef) -> crate::Result<()>;

    /// Apex name of the zone, e.g. `example.com`
    fn zone_name(&self) -> &str;

    fn provider_name(&self) -> &'static str;
}
