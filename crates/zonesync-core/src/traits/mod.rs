//! Collaborator traits for zonesync
//!
//! The engine only talks to the outside world through these interfaces.
//!
//! - [`ZoneSource`]: read the primary zone
//! - [`ZoneTarget`]: read and mutate the secondary zone
//! - [`RecordCache`]: optional read-through cache for the secondary listing
//! - [`Notifier`]: per-cycle completion/failure notifications
//! - [`MetricsSink`]: per-cycle metrics

pub mod metrics;
pub mod notifier;
pub mod record_cache;
pub mod zone_source;
pub mod zone_target;

pub use metrics::{Metric, MetricsSink};
pub use notifier::{NotificationKind, Notifier, SyncNotification};
pub use record_cache::{CachedRecords, RecordCache};
pub use zone_source::ZoneSource;
pub use zone_target::ZoneTarget;
