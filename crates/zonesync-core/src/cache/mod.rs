// # Record Cache
//
// Read-through caching for the secondary zone listing.
//
// - [`MemoryRecordCache`]: in-process store with a one hour hard expiry
// - [`CachedTarget`]: wraps any [`crate::ZoneTarget`], serves fresh listings
//   from the cache and invalidates on every successful mutation

pub mod memory;
pub mod target;

pub use memory::MemoryRecordCache;
pub use target::CachedTarget;

use chrono::Duration;

/// Listings younger than this (seconds) are served from the cache
pub const FRESHNESS_WINDOW_SECS: i64 = 5 * 60;

/// Listings older than this (seconds) are never returned
pub const HARD_EXPIRY_SECS: i64 = 60 * 60;

pub fn freshness_window() -> Duration {
    Duration::seconds(FRESHNESS_WINDOW_SECS)
}

pub fn hard_expiry() -> Duration {
    Duration::seconds(HARD_EXPIRY_SECS)
}
