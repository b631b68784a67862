//! Provider-native record shapes
//!
//! [`SourceRecord`] mirrors a Cloudflare `dns_records` entry, [`TargetRecord`]
//! mirrors a ClouDNS `records.json` entry. Both keep `type` as a raw string so
//! an unsupported type is skipped during normalization instead of failing the
//! whole listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CanonicalRecord, lenient};

/// Record as returned by the primary (Cloudflare API v4)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: String,

    #[serde(rename = "type")]
    pub record_type: String,

    /// Fully-qualified name, e.g. `www.example.com`
    pub name: String,

    pub content: String,

    /// `1` means "automatic"
    pub ttl: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u16>,

    /// Structured per-type payload (SRV, CAA, NAPTR, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_on: Option<DateTime<Utc>>,
}

/// Record as returned by the secondary (ClouDNS HTTP API)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TargetRecord {
    #[serde(deserialize_with = "lenient::id")]
    pub id: String,

    #[serde(rename = "type")]
    pub record_type: String,

    /// Relative host; `@` or empty for the apex
    #[serde(default)]
    pub host: String,

    /// Record value
    #[serde(default)]
    pub record: String,

    #[serde(deserialize_with = "lenient::number")]
    pub ttl: u32,

    #[serde(default, deserialize_with = "lenient::opt_number", skip_serializing_if = "Option::is_none")]
    pub priority: Option<u16>,

    #[serde(default, deserialize_with = "lenient::opt_number", skip_serializing_if = "Option::is_none")]
    pub weight: Option<u16>,

    #[serde(default, deserialize_with = "lenient::opt_number", skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default, deserialize_with = "lenient::opt_number", skip_serializing_if = "Option::is_none")]
    pub caa_flag: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caa_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caa_value: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_number", skip_serializing_if = "Option::is_none")]
    pub order: Option<u16>,

    #[serde(default, deserialize_with = "lenient::opt_number", skip_serializing_if = "Option::is_none")]
    pub pref: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regexp: Option<String>,
}

/// Opaque handle used to mutate a record on the secondary.
///
/// No equality: a handle is only ever passed back to the adapter that issued it.
#[derive(Debug, Clone)]
pub struct ProviderRef {
    pub id: String,
    pub raw: Option<TargetRecord>,
}

impl ProviderRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            raw: None,
        }
    }

    /// Handle for a record the provider created without reporting its id
    pub fn unassigned() -> Self {
        Self::new(String::new())
    }

    pub fn is_assigned(&self) -> bool {
        !self.id.is_empty()
    }

    pub fn with_raw(raw: TargetRecord) -> Self {
        Self {
            id: raw.id.clone(),
            raw: Some(raw),
        }
    }
}

/// A normalized secondary record together with its mutation handle
#[derive(Debug, Clone)]
pub struct TargetEntry {
    pub record: CanonicalRecord,
    pub reference: ProviderRef,
}

/// A secondary record of a type the sync does not model. It can never be
/// matched, only deleted.
#[derive(Debug, Clone)]
pub struct UnsupportedEntry {
    pub record_type: String,
    /// Absolute name
    pub name: String,
    pub reference: ProviderRef,
}

/// Normalized secondary listing
#[derive(Debug, Clone, Default)]
pub struct TargetListing {
    pub entries: Vec<TargetEntry>,
    pub unsupported: Vec<UnsupportedEntry>,
}

impl TargetListing {
    /// Every listed record, supported or not
    pub fn len(&self) -> usize {
        self.entries.len() + self.unsupported.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
