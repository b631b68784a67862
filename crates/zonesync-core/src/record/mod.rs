// # Canonical Record Model
//
// Every record fetched from either provider is normalized into a
// [`CanonicalRecord`] before any comparison happens. The provider-native
// shapes live in [`schema`].
//
// ## Invariants
//
// - `name` is always absolute: the apex is the zone name itself, never `@`
// - `name` never carries a trailing dot
// - `fields` always belongs to `record_type` (MX carries `Mx`, A carries `None`, ...)

mod lenient;
pub mod schema;

pub use schema::{ProviderRef, SourceRecord, TargetEntry, TargetListing, TargetRecord, UnsupportedEntry};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// DNS record types the sync understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
    Txt,
    Mx,
    Ns,
    Srv,
    Caa,
    Ptr,
    Dnskey,
    Ds,
    Naptr,
    Smimea,
    Sshfp,
    Tlsa,
    Uri,
}

impl RecordType {
    pub const ALL: [RecordType; 16] = [
        RecordType::A,
        RecordType::Aaaa,
        RecordType::Cname,
        RecordType::Txt,
        RecordType::Mx,
        RecordType::Ns,
        RecordType::Srv,
        RecordType::Caa,
        RecordType::Ptr,
        RecordType::Dnskey,
        RecordType::Ds,
        RecordType::Naptr,
        RecordType::Smimea,
        RecordType::Sshfp,
        RecordType::Tlsa,
        RecordType::Uri,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Txt => "TXT",
            RecordType::Mx => "MX",
            RecordType::Ns => "NS",
            RecordType::Srv => "SRV",
            RecordType::Caa => "CAA",
            RecordType::Ptr => "PTR",
            RecordType::Dnskey => "DNSKEY",
            RecordType::Ds => "DS",
            RecordType::Naptr => "NAPTR",
            RecordType::Smimea => "SMIMEA",
            RecordType::Sshfp => "SSHFP",
            RecordType::Tlsa => "TLSA",
            RecordType::Uri => "URI",
        }
    }

    /// Whether equality checks compare type-specific fields for this type.
    ///
    /// Only MX and SRV do; CAA and NAPTR attributes are carried for mutation
    /// calls but equality relies on `content` alone.
    pub fn compares_fields(&self) -> bool {
        matches!(self, RecordType::Mx | RecordType::Srv)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        RecordType::ALL
            .into_iter()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| Error::UnsupportedRecordType(s.to_string()))
    }
}

/// Type-specific attributes, populated only for types that define them
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeFields {
    #[default]
    None,
    Mx {
        priority: u16,
    },
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
    },
    Caa {
        flags: u8,
        tag: String,
    },
    Naptr {
        order: u16,
        preference: u16,
        flags: String,
        service: String,
        regexp: String,
    },
}

impl TypeFields {
    /// Whether this variant is the one `record_type` carries
    pub fn belongs_to(&self, record_type: RecordType) -> bool {
        match self {
            TypeFields::None => !matches!(
                record_type,
                RecordType::Mx | RecordType::Srv | RecordType::Caa | RecordType::Naptr
            ),
            TypeFields::Mx { .. } => record_type == RecordType::Mx,
            TypeFields::Srv { .. } => record_type == RecordType::Srv,
            TypeFields::Caa { .. } => record_type == RecordType::Caa,
            TypeFields::Naptr { .. } => record_type == RecordType::Naptr,
        }
    }

    pub fn priority(&self) -> Option<u16> {
        match self {
            TypeFields::Mx { priority } | TypeFields::Srv { priority, .. } => Some(*priority),
            _ => None,
        }
    }

    pub fn weight(&self) -> Option<u16> {
        match self {
            TypeFields::Srv { weight, .. } => Some(*weight),
            _ => None,
        }
    }

    pub fn port(&self) -> Option<u16> {
        match self {
            TypeFields::Srv { port, .. } => Some(*port),
            _ => None,
        }
    }
}

/// Provider-neutral DNS record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalRecord {
    record_type: RecordType,
    name: String,
    content: String,
    ttl: u32,
    fields: TypeFields,
}

impl CanonicalRecord {
    /// Build a canonical record.
    ///
    /// `name` must already be absolute; a trailing dot is stripped. Fails
    /// when `fields` does not match `record_type`.
    pub fn new(
        record_type: RecordType,
        name: impl Into<String>,
        content: impl Into<String>,
        ttl: u32,
        fields: TypeFields,
    ) -> Result<Self> {
        if !fields.belongs_to(record_type) {
            return Err(Error::malformed(
                "canonical",
                format!("{record_type} record cannot carry {fields:?}"),
            ));
        }

        let name = name.into();
        let name = name.strip_suffix('.').unwrap_or(&name).to_string();
        if name.is_empty() {
            return Err(Error::malformed("canonical", "record name cannot be empty"));
        }

        Ok(Self {
            record_type,
            name,
            content: content.into(),
            ttl,
            fields,
        })
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    /// Absolute name without trailing dot
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    pub fn fields(&self) -> &TypeFields {
        &self.fields
    }

    /// `"<TYPE> <name>"`, used in logs and report details
    pub fn identity(&self) -> String {
        format!("{} {}", self.record_type, self.name)
    }
}
