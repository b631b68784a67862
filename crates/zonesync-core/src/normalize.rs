//! Normalization of provider-native records into [`CanonicalRecord`]
//!
//! Both providers describe the same zone in different shapes: Cloudflare
//! returns absolute names and a structured `data` object, ClouDNS returns
//! relative hosts and flat (often stringly-typed) columns. The [`Normalizer`]
//! maps both into the canonical model so the matcher never sees provider
//! quirks.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::record::{
    CanonicalRecord, ProviderRef, RecordType, SourceRecord, TargetEntry, TargetListing, TargetRecord, TypeFields,
    UnsupportedEntry,
};

/// Cloudflare reports TTL `1` for "automatic"
const CLOUDFLARE_AUTO_TTL: u32 = 1;

/// TTL substituted for Cloudflare's automatic TTL
pub const AUTO_TTL_SECS: u32 = 300;

const SOURCE: &str = "cloudflare";
const TARGET: &str = "cloudns";

#[derive(Deserialize)]
struct SrvData {
    #[serde(default)]
    priority: Option<u16>,
    weight: u16,
    port: u16,
    #[serde(default)]
    target: Option<String>,
}

#[derive(Deserialize)]
struct CaaData {
    flags: u8,
    tag: String,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Deserialize)]
struct NaptrData {
    order: u16,
    preference: u16,
    #[serde(default)]
    flags: String,
    #[serde(default)]
    service: String,
    #[serde(default, alias = "regexp")]
    regex: String,
}

/// Maps provider records of one zone into canonical form
#[derive(Debug, Clone)]
pub struct Normalizer {
    zone: String,
}

impl Normalizer {
    /// `zone` is the apex name, e.g. `example.com`
    pub fn new(zone: impl Into<String>) -> Self {
        let zone = zone.into();
        let zone = zone.trim_end_matches('.').to_ascii_lowercase();
        Self { zone }
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Normalize one primary record
    pub fn normalize_source(&self, record: &SourceRecord) -> Result<CanonicalRecord> {
        let record_type: RecordType = record.record_type.parse()?;
        let ttl = if record.ttl == CLOUDFLARE_AUTO_TTL {
            AUTO_TTL_SECS
        } else {
            record.ttl
        };

        let mut content = record.content.clone();
        let fields = match record_type {
            RecordType::Mx => {
                let priority = record
                    .priority
                    .ok_or_else(|| missing(SOURCE, record_type, &record.name, "priority"))?;
                TypeFields::Mx { priority }
            }
            RecordType::Srv => {
                let data: SrvData = source_data(record)?;
                let priority = record
                    .priority
                    .or(data.priority)
                    .ok_or_else(|| missing(SOURCE, record_type, &record.name, "priority"))?;
                // Cloudflare packs "weight port target" into content; the
                // secondary stores the target alone.
                if let Some(target) = data.target {
                    content = target;
                }
                TypeFields::Srv {
                    priority,
                    weight: data.weight,
                    port: data.port,
                }
            }
            RecordType::Caa => {
                let data: CaaData = source_data(record)?;
                if let Some(value) = data.value {
                    content = value;
                }
                TypeFields::Caa {
                    flags: data.flags,
                    tag: data.tag,
                }
            }
            RecordType::Naptr => {
                let data: NaptrData = source_data(record)?;
                TypeFields::Naptr {
                    order: data.order,
                    preference: data.preference,
                    flags: data.flags,
                    service: data.service,
                    regexp: data.regex,
                }
            }
            _ => TypeFields::None,
        };

        CanonicalRecord::new(record_type, &record.name, content, ttl, fields)
    }

    /// Normalize one secondary record, resolving its relative host
    pub fn normalize_target(&self, record: &TargetRecord) -> Result<CanonicalRecord> {
        let record_type: RecordType = record.record_type.parse()?;
        let name = self.absolute_name(&record.host);
        let require = |value: Option<u16>, field: &str| {
            value.ok_or_else(|| missing(TARGET, record_type, &name, field))
        };

        let mut content = record.record.clone();
        let fields = match record_type {
            RecordType::Mx => TypeFields::Mx {
                priority: require(record.priority, "priority")?,
            },
            RecordType::Srv => TypeFields::Srv {
                priority: require(record.priority, "priority")?,
                weight: require(record.weight, "weight")?,
                port: require(record.port, "port")?,
            },
            RecordType::Caa => {
                if let Some(value) = record.caa_value.as_ref().filter(|v| !v.is_empty()) {
                    content = value.clone();
                }
                TypeFields::Caa {
                    flags: record.caa_flag.unwrap_or(0),
                    tag: record
                        .caa_type
                        .clone()
                        .ok_or_else(|| missing(TARGET, record_type, &name, "caa_type"))?,
                }
            }
            RecordType::Naptr => TypeFields::Naptr {
                order: require(record.order, "order")?,
                preference: require(record.pref, "pref")?,
                flags: record.flag.clone().unwrap_or_default(),
                service: record.params.clone().unwrap_or_default(),
                regexp: record.regexp.clone().unwrap_or_default(),
            },
            _ => TypeFields::None,
        };

        CanonicalRecord::new(record_type, name, content, record.ttl, fields)
    }

    /// Normalize a full primary listing, skipping unsupported types
    pub fn normalize_sources(&self, records: &[SourceRecord]) -> Result<Vec<CanonicalRecord>> {
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            match self.normalize_source(record) {
                Ok(canonical) => out.push(canonical),
                Err(Error::UnsupportedRecordType(t)) => {
                    warn!("Skipping {} record {}: unsupported type", t, record.name);
                }
                Err(e) => return Err(e),
            }
        }
        debug!("Normalized {} of {} source records", out.len(), records.len());
        Ok(out)
    }

    /// Normalize a full secondary listing, keeping each record's handle.
    ///
    /// Records of unsupported types are set aside in
    /// [`TargetListing::unsupported`] so modes that prune the target can
    /// still delete them.
    pub fn normalize_targets(&self, records: &[TargetRecord]) -> Result<TargetListing> {
        let mut listing = TargetListing {
            entries: Vec::with_capacity(records.len()),
            unsupported: Vec::new(),
        };
        for record in records {
            match self.normalize_target(record) {
                Ok(canonical) => listing.entries.push(TargetEntry {
                    record: canonical,
                    reference: ProviderRef::with_raw(record.clone()),
                }),
                Err(Error::UnsupportedRecordType(t)) => {
                    warn!("{} record {} (id {}) has an unsupported type", t, record.host, record.id);
                    listing.unsupported.push(UnsupportedEntry {
                        record_type: record.record_type.clone(),
                        name: self.absolute_name(&record.host),
                        reference: ProviderRef::with_raw(record.clone()),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        debug!(
            "Normalized {} of {} target records",
            listing.entries.len(),
            records.len()
        );
        Ok(listing)
    }

    /// Relative host (`@` for the apex) to absolute name
    pub fn absolute_name(&self, host: &str) -> String {
        let host = host.trim_end_matches('.');
        if host.is_empty() || host == "@" {
            self.zone.clone()
        } else {
            format!("{}.{}", host, self.zone)
        }
    }

    /// Absolute name to the secondary's relative host
    pub fn relative_host(&self, name: &str) -> String {
        relative_host(name, &self.zone)
    }
}

/// Absolute name to relative host: the apex becomes `@`, `label.zone` becomes
/// `label`, anything outside the zone passes through unchanged.
pub fn relative_host(name: &str, zone: &str) -> String {
    let name = name.trim_end_matches('.');
    let zone = zone.trim_end_matches('.');
    if name.eq_ignore_ascii_case(zone) {
        return "@".to_string();
    }

    if let Some(split) = name.len().checked_sub(zone.len() + 1)
        && split > 0
        && name.is_char_boundary(split)
    {
        let (label, suffix) = name.split_at(split);
        if let Some(rest) = suffix.strip_prefix('.')
            && rest.eq_ignore_ascii_case(zone)
        {
            return label.to_string();
        }
    }
    name.to_string()
}

fn source_data<T: DeserializeOwned>(record: &SourceRecord) -> Result<T> {
    let value = record.data.clone().ok_or_else(|| {
        Error::malformed(
            SOURCE,
            format!("{} {} has no data object", record.record_type, record.name),
        )
    })?;
    serde_json::from_value(value).map_err(|e| {
        Error::malformed(
            SOURCE,
            format!("{} {} has invalid data: {}", record.record_type, record.name, e),
        )
    })
}

fn missing(provider: &str, record_type: RecordType, name: &str, field: &str) -> Error {
    Error::malformed(provider, format!("{record_type} {name} is missing {field}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source(record_type: &str, name: &str, content: &str, ttl: u32) -> SourceRecord {
        SourceRecord {
            id: "cf-1".into(),
            record_type: record_type.into(),
            name: name.into(),
            content: content.into(),
            ttl,
            priority: None,
            data: None,
            modified_on: None,
        }
    }

    fn target(record_type: &str, host: &str, value: &str, ttl: u32) -> TargetRecord {
        TargetRecord {
            id: "cd-1".into(),
            record_type: record_type.into(),
            host: host.into(),
            record: value.into(),
            ttl,
            ..Default::default()
        }
    }

    #[test]
    fn apex_host_becomes_zone() {
        let n = Normalizer::new("example.com");
        let record = n.normalize_target(&target("A", "@", "192.0.2.1", 300)).unwrap();
        assert_eq!(record.name(), "example.com");

        let record = n.normalize_target(&target("A", "", "192.0.2.1", 300)).unwrap();
        assert_eq!(record.name(), "example.com");
    }

    #[test]
    fn relative_host_is_qualified() {
        let n = Normalizer::new("example.com.");
        let record = n.normalize_target(&target("CNAME", "www", "example.com", 300)).unwrap();
        assert_eq!(record.name(), "www.example.com");
    }

    #[test]
    fn auto_ttl_is_substituted() {
        let n = Normalizer::new("example.com");
        let record = n.normalize_source(&source("A", "example.com", "192.0.2.1", 1)).unwrap();
        assert_eq!(record.ttl(), AUTO_TTL_SECS);
    }

    #[test]
    fn mx_priority_from_source() {
        let n = Normalizer::new("example.com");
        let mut mx = source("MX", "example.com", "mail.example.com", 300);
        mx.priority = Some(10);
        let record = n.normalize_source(&mx).unwrap();
        assert_eq!(record.fields(), &TypeFields::Mx { priority: 10 });

        mx.priority = None;
        assert!(matches!(n.normalize_source(&mx), Err(Error::MalformedResponse { .. })));
    }

    #[test]
    fn srv_fields_from_data() {
        let n = Normalizer::new("example.com");
        let mut srv = source("SRV", "_sip._tcp.example.com", "1 5060 sip.example.com", 300);
        srv.data = Some(json!({ "priority": 10, "weight": 1, "port": 5060, "target": "sip.example.com" }));
        let record = n.normalize_source(&srv).unwrap();
        assert_eq!(record.content(), "sip.example.com");
        assert_eq!(record.fields(), &TypeFields::Srv { priority: 10, weight: 1, port: 5060 });
    }

    #[test]
    fn srv_target_requires_all_fields() {
        let n = Normalizer::new("example.com");
        let mut srv = target("SRV", "_sip._tcp", "sip.example.com", 300);
        srv.priority = Some(10);
        srv.weight = Some(1);
        assert!(n.normalize_target(&srv).is_err());

        srv.port = Some(5060);
        let record = n.normalize_target(&srv).unwrap();
        assert_eq!(record.name(), "_sip._tcp.example.com");
        assert_eq!(record.fields().port(), Some(5060));
    }

    #[test]
    fn caa_and_naptr_fields() {
        let n = Normalizer::new("example.com");
        let mut caa = source("CAA", "example.com", "0 issue \"letsencrypt.org\"", 300);
        caa.data = Some(json!({ "flags": 0, "tag": "issue", "value": "letsencrypt.org" }));
        let record = n.normalize_source(&caa).unwrap();
        assert_eq!(record.content(), "letsencrypt.org");
        assert_eq!(record.fields(), &TypeFields::Caa { flags: 0, tag: "issue".into() });

        let mut naptr = target("NAPTR", "sip", "", 300);
        naptr.order = Some(100);
        naptr.pref = Some(10);
        naptr.flag = Some("S".into());
        let record = n.normalize_target(&naptr).unwrap();
        assert!(matches!(record.fields(), TypeFields::Naptr { order: 100, preference: 10, .. }));
    }

    #[test]
    fn unsupported_types_are_skipped_in_listings() {
        let n = Normalizer::new("example.com");
        let records = vec![
            source("A", "example.com", "192.0.2.1", 300),
            source("HINFO", "example.com", "x86 linux", 300),
            source("TXT", "example.com", "v=spf1 -all", 300),
        ];
        let out = n.normalize_sources(&records).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn target_listing_keeps_handles() {
        let n = Normalizer::new("example.com");
        let mut web_redirect = target("WR", "x", "https://example.org", 300);
        web_redirect.id = "cd-2".into();
        let listing = n
            .normalize_targets(&[target("A", "www", "192.0.2.1", 300), web_redirect])
            .unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing.entries.len(), 1);
        assert_eq!(listing.entries[0].reference.id, "cd-1");

        assert_eq!(listing.unsupported.len(), 1);
        let unsupported = &listing.unsupported[0];
        assert_eq!(unsupported.record_type, "WR");
        assert_eq!(unsupported.name, "x.example.com");
        assert_eq!(unsupported.reference.id, "cd-2");
    }

    #[test]
    fn hostname_formatting() {
        assert_eq!(relative_host("example.com", "example.com"), "@");
        assert_eq!(relative_host("www.example.com", "example.com"), "www");
        assert_eq!(relative_host("a.b.Example.com.", "example.com"), "a.b");
        assert_eq!(relative_host("other.org", "example.com"), "other.org");
        assert_eq!(relative_host("badexample.com", "example.com"), "badexample.com");
    }
}
