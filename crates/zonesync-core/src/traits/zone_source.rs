// # Zone Source Trait
//
// The authoritative side of the sync. Implementations only read.
//
// ## Implementations
//
// - Cloudflare: `zonesync-provider-cloudflare` crate

use async_trait::async_trait;

use crate::record::SourceRecord;

/// Read access to the primary zone
///
/// # Contract
///
/// - `fetch_all` performs the request once; the engine does not retry fetches
///   and a failure aborts the whole cycle
/// - Errors must be classified through [`crate::Error::from_status`] or
///   [`crate::Error::transport`] so they carry provider details
/// - Implementations never log credentials
#[async_trait]
pub trait ZoneSource: Send + Sync {
    /// Every record of the zone, in provider order
    async fn fetch_all(&self) -> crate::Result<Vec<SourceRecord>>;

    /// Short provider name, used in logs and errors
    fn provider_name(&self) -> &'static str;
}
